//! Security and isolation
//!
//! This module decides which client may touch which composite resource.
//! Resources created by the server itself (the root, the default colormap,
//! the screen saver window) are shared by every client.

use std::str::FromStr;

/// Client identifier; 0 is the server itself
pub type ClientId = u32;

/// Owner of server-created resources
pub const SERVER_CLIENT: ClientId = 0;

/// What a request intends to do with a resource it names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Query attributes or use the resource as a parameter
    GetAttr,
    /// Read pixel contents (GetImage, CopyArea source)
    Read,
    /// Modify the resource or draw into it
    Write,
    /// Free or destroy the resource
    Destroy,
}

/// Security policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Isolate resources - clients can only modify their own resources and
    /// those of the server
    pub resource_isolation: bool,

    /// Allow screen capture operations (reading pixels of non-owned drawables)
    pub allow_screen_capture: bool,

    /// Maximum composite resources per client (0 = unlimited)
    pub max_resources_per_client: usize,

    /// Largest image buffer a single GetImage or CopyArea may assemble, in
    /// bytes (0 = unlimited)
    pub max_image_bytes: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy {
            resource_isolation: true,
            allow_screen_capture: true, // Allow GetImage
            max_resources_per_client: 10_000,
            max_image_bytes: 256 << 20,
        }
    }
}

impl SecurityPolicy {
    /// Create a permissive policy (for testing) - allows everything
    pub fn permissive() -> Self {
        SecurityPolicy {
            resource_isolation: false,
            allow_screen_capture: true,
            max_resources_per_client: 0,
            max_image_bytes: 0,
        }
    }

    /// Create a strict policy (maximum security) - strictly limit to owned resources
    pub fn strict() -> Self {
        SecurityPolicy {
            resource_isolation: true,
            allow_screen_capture: false, // Block GetImage on non-owned drawables
            max_resources_per_client: 1000,
            max_image_bytes: 64 << 20,
        }
    }

    /// Whether `client` may perform `access` on a resource owned by `owner`
    pub fn permits(&self, client: ClientId, owner: ClientId, access: Access) -> bool {
        if client == owner || client == SERVER_CLIENT {
            return true;
        }
        match access {
            Access::GetAttr => true,
            Access::Read => self.allow_screen_capture,
            Access::Write | Access::Destroy => {
                !self.resource_isolation || owner == SERVER_CLIENT
            }
        }
    }

    /// Whether an image buffer of `len` bytes may be allocated
    pub fn may_allocate_image(&self, len: usize) -> bool {
        self.max_image_bytes == 0 || len <= self.max_image_bytes
    }

    /// Whether a client already holding `owned` resources may create another
    pub fn may_create(&self, owned: usize) -> bool {
        self.max_resources_per_client == 0 || owned < self.max_resources_per_client
    }
}

impl FromStr for SecurityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(SecurityPolicy::permissive()),
            "default" => Ok(SecurityPolicy::default()),
            "strict" => Ok(SecurityPolicy::strict()),
            other => Err(format!(
                "Unknown security policy '{}' (expected permissive, default or strict)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_blocks_foreign_writes() {
        let policy = SecurityPolicy::default();
        assert!(policy.permits(2, 2, Access::Destroy));
        assert!(!policy.permits(2, 1, Access::Write));
        assert!(policy.permits(2, 1, Access::GetAttr));
        assert!(policy.permits(2, SERVER_CLIENT, Access::Write));
    }

    #[test]
    fn test_strict_blocks_capture_of_server_resources() {
        let policy = SecurityPolicy::strict();
        assert!(!policy.permits(3, SERVER_CLIENT, Access::Read));
        assert!(policy.permits(3, 3, Access::Read));
    }

    #[test]
    fn test_resource_limit() {
        let policy = SecurityPolicy::strict();
        assert!(policy.may_create(999));
        assert!(!policy.may_create(1000));
        assert!(SecurityPolicy::permissive().may_create(usize::MAX));
    }

    #[test]
    fn test_image_limit() {
        let policy = SecurityPolicy::strict();
        assert!(policy.may_allocate_image(64 << 20));
        assert!(!policy.may_allocate_image((64 << 20) + 1));
        assert!(SecurityPolicy::permissive().may_allocate_image(usize::MAX));
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("strict".parse(), Ok(SecurityPolicy::strict()));
        assert!("lax".parse::<SecurityPolicy>().is_err());
    }
}
