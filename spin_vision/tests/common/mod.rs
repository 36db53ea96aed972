pub mod synthetic_clip;
