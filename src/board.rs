/// Hardware constants for supported boards.
///
/// Selected at compile time via feature flags. The library only reports
/// the board name; the firmware reads the rest.

#[cfg(feature = "board-xiao")]
mod hw {
    /// Recent-log rows shown per page on the companion UI
    pub const DISPLAY_ROWS: usize = 10;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(feature = "board-m5stickc")]
mod hw {
    pub const DISPLAY_ROWS: usize = 10;
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const DISPLAY_ROWS: usize = crate::recent::RECENT_DISPLAY_WINDOW;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
