//! EntityService: generic validated CRUD over a storage gateway.

mod crud;
mod validation;
pub use crud::EntityService;
pub use validation::RequestValidator;
