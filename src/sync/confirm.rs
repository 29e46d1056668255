use async_trait::async_trait;

/// Asks the user a yes/no question. The sync engine waits on the answer
/// before changing anything.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Always gives the same answer without asking anyone.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirm for FixedAnswer {
    async fn confirm(&self, title: &str, _message: &str) -> bool {
        tracing::debug!("Answering {:?} with {}", title, self.0);
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_answer() {
        assert!(tokio_test::block_on(
            FixedAnswer(true).confirm("Bookmark Already Exists", "Overwrite?")
        ));
        assert!(!tokio_test::block_on(
            FixedAnswer(false).confirm("Bookmark Already Exists", "Overwrite?")
        ));
    }
}
