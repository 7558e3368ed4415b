pub mod component;
pub mod group;
pub mod incident;
pub mod requests;
pub mod update;

pub use component::*;
pub use group::*;
pub use incident::*;
pub use requests::*;
pub use update::*;
