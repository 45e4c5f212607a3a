/// Health-store query and observation errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store query failed for {type_name}: {message}")]
    QueryFailed { type_name: String, message: String },

    #[error("store authorization denied for {type_name}")]
    AuthorizationDenied { type_name: String },

    #[error("observer registration failed for {type_name}: {message}")]
    ObserverFailed { type_name: String, message: String },

    #[error("background delivery registration failed for {type_name}: {message}")]
    BackgroundDeliveryFailed { type_name: String, message: String },
}
