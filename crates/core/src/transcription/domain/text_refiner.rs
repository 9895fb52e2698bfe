use super::api_error::ApiError;

/// Domain interface for the remote text-refinement capability.
pub trait TextRefiner: Send {
    fn verify_credentials(&self) -> Result<(), ApiError> {
        Ok(())
    }

    /// Rewrites `text` for readability without dropping information.
    fn refine(&self, text: &str) -> Result<String, ApiError>;
}
