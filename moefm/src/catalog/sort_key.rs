use std::sync::atomic::{AtomicU64, Ordering};

/// Allocateur de clés de tri, possédé par le catalogue
///
/// Chaque appel à [`next`](Self::next) renvoie un entier distinct et
/// strictement supérieur aux précédents, quel que soit le nombre d'appelants
/// concurrents. Le compteur n'est jamais remis à zéro.
#[derive(Debug)]
pub struct SortKeyAllocator {
    next: AtomicU64,
}

impl Default for SortKeyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SortKeyAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Dernière clé distribuée (0 si aucune)
    pub fn last(&self) -> u64 {
        self.next.load(Ordering::Relaxed).saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_keys_are_strictly_increasing() {
        let alloc = SortKeyAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert!(b > a);
        assert_eq!(alloc.last(), b);
    }

    #[test]
    fn test_concurrent_callers_never_share_a_key() {
        let alloc = Arc::new(SortKeyAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = alloc.clone();
                std::thread::spawn(move || (0..500).map(|_| alloc.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(seen.insert(key), "duplicate sort key {}", key);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
