pub mod frame_transform_fl;
