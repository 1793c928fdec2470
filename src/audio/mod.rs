pub mod extract;
pub mod resample;
pub mod stretch;
pub mod wav;

pub use extract::{check_ffmpeg, check_ffprobe, FfmpegTools, MediaKind, MediaTools};
pub use resample::{resample, resampled_len};
pub use stretch::{stretched_len, time_stretch};
pub use wav::{decode_wav_bytes, read_wav, wav_duration, write_wav};
