/// Domain layer: the records exchanged with the deployment pipeline
pub mod entities;
pub mod value_objects;
