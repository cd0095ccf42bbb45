//! Navigation seam used when the session is lost

/// Moves the user to another screen.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);

    /// Location to come back to after signing in again.
    fn current_path(&self) -> Option<String> {
        None
    }
}
