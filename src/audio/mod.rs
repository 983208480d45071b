pub mod codec;
pub mod file;
pub mod level;
pub mod resample;

pub use codec::{decode_pcm_base64, to_mono, validate_sample_rate, DecodedAudio};
pub use file::AudioFile;
pub use level::{peak, rms};
pub use resample::{resample, RateConverter};
