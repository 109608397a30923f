//! Shared UI crate for Proctorlock: the exam security monitor, its platform
//! backends, and the host views built on top of it.

pub mod core;
pub mod i18n;
pub mod security;
pub mod views;

pub mod components {
    // Localized application navbar (components/app_navbar.rs)
    pub mod app_navbar;
    pub use app_navbar::register_nav;
    pub use app_navbar::AppNavbar;
    pub use app_navbar::NavBuilder;

    mod policy_settings;
    pub use policy_settings::PolicySettings;

    mod proctor_panel;
    pub use proctor_panel::ProctorPanel;
}
