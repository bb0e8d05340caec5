pub mod analysis;
pub mod cluster;
pub mod decode;
pub mod features;
pub mod frames;
pub mod mel;
pub mod normalize;
pub mod onset;
pub mod pitch;
pub mod spectral;
pub mod sustain;
