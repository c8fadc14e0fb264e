pub mod record_screen_fl;
