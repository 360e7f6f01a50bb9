use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

/// Outstanding single-use challenges, one per subject.
///
/// Ephemeral: nothing survives a restart.
#[derive(Debug, Clone)]
pub struct ChallengeRegistry {
    /// Map of username -> challenge value
    challenges: Arc<Mutex<HashMap<String, String>>>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self {
            challenges: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Issue a fresh challenge for `subject`, replacing any outstanding one.
    pub async fn issue(&self, subject: &str) -> String {
        let challenge = format!("challenge_{}", Uuid::new_v4().simple());

        let replaced = self
            .challenges
            .lock()
            .await
            .insert(subject.to_string(), challenge.clone());

        tracing::debug!(
            subject = %subject,
            replaced = replaced.is_some(),
            "Challenge issued"
        );
        challenge
    }

    /// Check `presented` against the outstanding challenge and consume it on a match.
    ///
    /// A mismatch or a missing challenge leaves the registry unchanged.
    pub async fn verify(&self, subject: &str, presented: &str) -> bool {
        let mut challenges = self.challenges.lock().await;

        match challenges.get(subject) {
            Some(outstanding) if outstanding == presented => {
                challenges.remove(subject);
                tracing::debug!(subject = %subject, "Challenge consumed");
                true
            }
            _ => false,
        }
    }
}

impl Default for ChallengeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_challenge_verifies_once() {
        let registry = ChallengeRegistry::new();
        let challenge = registry.issue("alice").await;

        assert!(challenge.starts_with("challenge_"));
        assert!(registry.verify("alice", &challenge).await);
        assert!(!registry.verify("alice", &challenge).await);
        assert!(registry.challenges.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous() {
        let registry = ChallengeRegistry::new();
        let first = registry.issue("alice").await;
        let second = registry.issue("alice").await;

        assert_ne!(first, second);
        assert!(!registry.verify("alice", &first).await);
        assert!(registry.verify("alice", &second).await);
    }

    #[tokio::test]
    async fn test_failed_verify_keeps_challenge() {
        let registry = ChallengeRegistry::new();
        let challenge = registry.issue("alice").await;

        assert!(!registry.verify("alice", "challenge_wrong").await);
        assert!(!registry.verify("bobby", &challenge).await);
        assert!(registry.verify("alice", &challenge).await);
    }

    #[tokio::test]
    async fn test_concurrent_verify_succeeds_exactly_once() {
        let registry = ChallengeRegistry::new();
        let challenge = registry.issue("alice").await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let challenge = challenge.clone();
            handles.push(tokio::spawn(async move {
                registry.verify("alice", &challenge).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
