pub mod crud;
pub mod etapa;
pub mod observacion;

pub use crud::*;
pub use etapa::*;
pub use observacion::*;
