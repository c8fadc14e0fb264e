pub mod frame_transform;
pub mod record_screen;
pub mod video_encoding;
