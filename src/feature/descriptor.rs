/// Immutable identity and declared constraints for one feature.
///
/// Ordering is expressed as a declared edge set consumed solely by the
/// dependency resolver at composition time; it is never re-consulted after
/// the order has been resolved.
#[derive(Debug, Clone)]
pub struct FeatureDescriptor {
    name: String,
    starts_after: Vec<String>,
    optional: bool,
    requires_elevated_privileges: bool,
}

impl FeatureDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            starts_after: Vec::new(),
            optional: false,
            requires_elevated_privileges: false,
        }
    }

    /// Declare that this feature enters each phase only after `name` — if
    /// `name` is registered and enabled. Absent collaborators are ignored at
    /// resolution time.
    pub fn starts_after(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.starts_after.contains(&name) {
            self.starts_after.push(name);
        }
        self
    }

    /// An optional feature's absence or validation failure disables it
    /// instead of aborting the process.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Advisory flag for the privilege-dropping collaborator.
    pub fn requires_elevated_privileges(mut self, requires: bool) -> Self {
        self.requires_elevated_privileges = requires;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.starts_after
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn needs_elevated_privileges(&self) -> bool {
        self.requires_elevated_privileges
    }
}
