/// Infrastructure layer - external frameworks and tools
pub mod console;
pub mod http_client;
pub mod privileges;

pub use console::TerminalConsole;
pub use http_client::ReqwestDownloader;
pub use privileges::HostPrivileges;
