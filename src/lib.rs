pub mod camera;
pub mod config;
pub mod events;
pub mod params;
pub mod quilt;
pub mod upload;
pub mod render {
    pub mod capture;
    pub mod displace;
}
pub mod tasks {
    pub mod control;
    pub mod loader;
    pub mod viewer;
}
