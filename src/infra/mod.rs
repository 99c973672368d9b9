pub mod wigle;
