/// Host privilege check
/// Implements PrivilegeCheck with the platform's notion of an administrator

use crate::domain::repositories::PrivilegeCheck;

#[derive(Debug, Clone, Copy, Default)]
pub struct HostPrivileges;

impl HostPrivileges {
    pub fn new() -> Self {
        Self
    }
}

impl PrivilegeCheck for HostPrivileges {
    #[cfg(windows)]
    fn is_elevated(&self) -> bool {
        // SAFETY: IsUserAnAdmin takes no arguments and only reads the process token.
        unsafe { windows::Win32::UI::Shell::IsUserAnAdmin().as_bool() }
    }

    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(not(any(windows, unix)))]
    fn is_elevated(&self) -> bool {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_matches_effective_uid() {
        assert_eq!(
            HostPrivileges::new().is_elevated(),
            nix::unistd::geteuid().is_root()
        );
    }
}
