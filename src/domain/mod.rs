// Domain layer: book models and the ports (collaborator interfaces) the pipeline consumes.

pub mod model;
pub mod ports;
