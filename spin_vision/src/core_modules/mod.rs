pub mod angle_sampler;
pub mod angle_series;
pub mod calibration;
pub mod color_range;
pub mod frame;
pub mod hsv;
pub mod kinematics;
pub mod marker_locator;
pub mod overlay;
pub mod sample_table;
