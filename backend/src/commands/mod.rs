pub mod alertas;
pub mod auth;
pub mod calendario;
pub mod cultivos;
pub mod dashboard;
pub mod entregas;
pub mod mapa;
pub mod media;
pub mod reportes;
pub mod usuarios;
pub mod utility;
