//! Ordered system scheduler
//!
//! A directed list of named system functions executed in registration
//! order. The registration order IS the dependency contract between the
//! GI stages; there is no data-flow analysis and no dynamic dispatch
//! beyond the stored function pointers.

/// One scheduled system.
pub struct SystemNode<Ctx> {
    pub name: &'static str,
    pub run: fn(&mut Ctx),
}

pub struct Scheduler<Ctx> {
    systems: Vec<SystemNode<Ctx>>,
}

impl<Ctx> Default for Scheduler<Ctx> {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
        }
    }
}

impl<Ctx> Scheduler<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, run: fn(&mut Ctx)) {
        self.systems.push(SystemNode { name, run });
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name).collect()
    }

    pub fn run(&self, ctx: &mut Ctx) {
        for system in &self.systems {
            log::trace!("system: {}", system.name);
            (system.run)(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_in_registration_order() {
        let mut scheduler: Scheduler<Vec<&'static str>> = Scheduler::new();
        scheduler.register("first", |log| log.push("first"));
        scheduler.register("second", |log| log.push("second"));
        scheduler.register("third", |log| log.push("third"));

        let mut log = Vec::new();
        scheduler.run(&mut log);
        assert_eq!(log, vec!["first", "second", "third"]);
        assert_eq!(scheduler.names(), vec!["first", "second", "third"]);
    }
}
