pub mod ffmpeg_sink_fl;
