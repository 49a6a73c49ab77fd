use std::collections::HashSet;

/// Per-module waiting stack (§4.1): tracks which notifying entry points have arrived
/// during the current tick and reports when the last of them does, so the caller can
/// fire `update()` and start the next tick's wait.
#[derive(Clone, Debug)]
pub struct FiringGate {
    required: Vec<&'static str>,
    arrived: HashSet<&'static str>,
}

impl FiringGate {
    pub fn new(required: &[&'static str]) -> Self {
        FiringGate { required: required.to_vec(), arrived: HashSet::new() }
    }

    /// Records the arrival of notifying port `key`. Returns `true` exactly when this
    /// arrival completes the set for this tick; the gate resets itself immediately so
    /// the next tick starts clean.
    pub fn arrive(&mut self, key: &'static str) -> bool {
        if !self.required.contains(&key) {
            return false;
        }
        self.arrived.insert(key);
        if self.arrived.len() >= self.required.len() {
            self.arrived.clear();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.arrived.clear();
    }

    pub fn required_ports(&self) -> &[&'static str] {
        &self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_once_all_required_ports_arrived() {
        let mut gate = FiringGate::new(&["a", "b", "c"]);
        assert!(!gate.arrive("a"));
        assert!(!gate.arrive("b"));
        assert!(gate.arrive("c"));
    }

    #[test]
    fn resets_after_firing_for_next_tick() {
        let mut gate = FiringGate::new(&["a", "b"]);
        assert!(!gate.arrive("a"));
        assert!(gate.arrive("b"));
        // next tick
        assert!(!gate.arrive("a"));
        assert!(gate.arrive("b"));
    }

    #[test]
    fn unknown_port_never_fires() {
        let mut gate = FiringGate::new(&["a"]);
        assert!(!gate.arrive("z"));
        assert!(gate.arrive("a"));
    }
}
