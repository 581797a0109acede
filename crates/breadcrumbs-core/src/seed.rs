//! Seed resolution and process-wide random-generator seeding.
//!
//! A run's seed either comes in through the tracked function's seed
//! parameter (exact reproduction of an earlier run) or is generated fresh.
//! Either way the resolved value is handed to every registered
//! [`RngCollaborator`] that reports itself available, and ends up in the
//! run record. Seeding mutates process-global generator state on purpose:
//! controlling the whole process's randomness is the point.

use std::sync::{Mutex, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// A seedable random-number source that may or may not be present in the
/// running process.
///
/// Implementations wrap one library's global seeding entrypoint. An
/// unavailable collaborator is skipped silently; absence is a normal state.
pub trait RngCollaborator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether the underlying library is present and seedable.
    fn is_available(&self) -> bool {
        true
    }

    /// Seed the underlying generator.
    fn seed(&self, seed: u64);
}

static GLOBAL_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn global() -> &'static Mutex<StdRng> {
    GLOBAL_RNG.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

/// Run a closure against the process-global generator.
///
/// This is the generator [`GlobalStdRng`] seeds; user code drawing its
/// randomness from here reproduces exactly when re-run with a recorded
/// seed.
pub fn with_global_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = global().lock().unwrap_or_else(|e| e.into_inner());
    f(&mut rng)
}

/// Built-in collaborator seeding the process-global [`StdRng`].
#[derive(Debug, Default)]
pub struct GlobalStdRng;

impl RngCollaborator for GlobalStdRng {
    fn name(&self) -> &'static str {
        "std_rng"
    }

    fn seed(&self, seed: u64) {
        let mut rng = global().lock().unwrap_or_else(|e| e.into_inner());
        *rng = StdRng::seed_from_u64(seed);
    }
}

/// Generate a fresh seed, uniform over the common 32-bit seeding range.
pub fn generate_seed() -> u64 {
    rand::thread_rng().gen_range(0..=u32::MAX as u64)
}

/// Registry of seedable collaborators applied once per tracked call.
pub struct SeedManager {
    collaborators: Vec<Box<dyn RngCollaborator>>,
}

impl std::fmt::Debug for SeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedManager")
            .field("collaborators", &self.collaborators.len())
            .finish()
    }
}

impl Default for SeedManager {
    fn default() -> Self {
        Self {
            collaborators: vec![Box::new(GlobalStdRng)],
        }
    }
}

impl SeedManager {
    /// Registry with the built-in global-generator collaborator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no collaborators at all.
    pub fn empty() -> Self {
        Self {
            collaborators: Vec::new(),
        }
    }

    /// Register an additional collaborator.
    pub fn register(&mut self, collaborator: Box<dyn RngCollaborator>) {
        self.collaborators.push(collaborator);
    }

    /// Resolve the seed for one call and seed every available collaborator.
    ///
    /// A caller-supplied seed is used verbatim; otherwise one is generated.
    /// The resolved value is returned for injection and recording.
    pub fn resolve(&self, requested: Option<u64>) -> u64 {
        let seed = requested.unwrap_or_else(generate_seed);
        for collaborator in &self.collaborators {
            if collaborator.is_available() {
                collaborator.seed(seed);
                debug!(collaborator = collaborator.name(), seed, "Seeded generator");
            } else {
                debug!(collaborator = collaborator.name(), "Skipped unavailable generator");
            }
        }
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    struct Recording {
        available: bool,
        seen: Arc<AtomicU64>,
        called: Arc<AtomicBool>,
    }

    impl RngCollaborator for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn seed(&self, seed: u64) {
            self.seen.store(seed, Ordering::SeqCst);
            self.called.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn caller_seed_is_used_verbatim() {
        assert_eq!(SeedManager::empty().resolve(Some(42)), 42);
    }

    #[test]
    fn generated_seed_is_within_range() {
        let seed = SeedManager::empty().resolve(None);
        assert!(seed <= u32::MAX as u64);
    }

    #[test]
    fn available_collaborators_receive_the_seed() {
        let seen = Arc::new(AtomicU64::new(0));
        let called = Arc::new(AtomicBool::new(false));
        let mut manager = SeedManager::empty();
        manager.register(Box::new(Recording {
            available: true,
            seen: seen.clone(),
            called: called.clone(),
        }));

        manager.resolve(Some(7));
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn unavailable_collaborators_are_skipped() {
        let called = Arc::new(AtomicBool::new(false));
        let mut manager = SeedManager::empty();
        manager.register(Box::new(Recording {
            available: false,
            seen: Arc::new(AtomicU64::new(0)),
            called: called.clone(),
        }));

        manager.resolve(Some(7));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn seeded_global_generator_reproduces_sequences() {
        let manager = SeedManager::new();

        manager.resolve(Some(1234));
        let first: Vec<u32> = with_global_rng(|rng| (0..4).map(|_| rng.gen()).collect());

        manager.resolve(Some(1234));
        let second: Vec<u32> = with_global_rng(|rng| (0..4).map(|_| rng.gen()).collect());

        assert_eq!(first, second);
    }
}
