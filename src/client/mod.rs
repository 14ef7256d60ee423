pub mod file_audio_output;
pub mod http_client;

pub use file_audio_output::FileAudioOutput;
pub use http_client::HttpClient;
