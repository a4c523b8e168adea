mod container_info;

pub use container_info::{ContainerInfo, ContainerInfoBuilder};
