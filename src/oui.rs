/// OUI vendor resolution.
///
/// The vendor table is produced off-device by `oui-gen` and compiled in as
/// read-only data (`vendors.rs`). Lookups are an iterative binary search:
/// no allocation, constant stack, O(log n) comparisons.
use crate::mac::{MacAddress, OuiPrefix};

/// Longest vendor name kept in the table, in characters.
pub const MAX_VENDOR_NAME_LEN: usize = 30;

/// Characters kept from an overlong name before the ellipsis.
pub const TRUNCATED_NAME_LEN: usize = MAX_VENDOR_NAME_LEN - ELLIPSIS.len();

/// Marker appended to truncated vendor names.
pub const ELLIPSIS: &str = "...";

/// Longest vendor name kept in the table, in UTF-8 bytes. Matches the
/// capacity of a display label so a name is never cut a second time.
pub const MAX_VENDOR_NAME_BYTES: usize = 32;

/// One compiled table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorEntry {
    pub prefix: u32,
    pub name: &'static str,
}

impl VendorEntry {
    pub const fn new(prefix: u32, name: &'static str) -> Self {
        Self { prefix, name }
    }
}

/// A sorted, prefix-unique vendor table.
#[derive(Debug, Clone, Copy)]
pub struct VendorTable {
    entries: &'static [VendorEntry],
}

impl VendorTable {
    /// Wrap a compiled table. The slice must be strictly ascending by prefix;
    /// `oui-gen` guarantees this and [`is_well_formed`](Self::is_well_formed)
    /// checks it.
    pub const fn new(entries: &'static [VendorEntry]) -> Self {
        Self { entries }
    }

    /// The table embedded in the firmware image.
    pub const fn builtin() -> Self {
        Self::new(crate::vendors::OUI_TABLE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &'static [VendorEntry] {
        self.entries
    }

    /// Vendor name for a prefix, or `None` when the prefix is not registered.
    pub fn resolve(&self, prefix: OuiPrefix) -> Option<&'static str> {
        search(self.entries, prefix.value(), &mut 0).map(|i| self.entries[i].name)
    }

    /// Vendor name for the OUI of a full MAC address.
    pub fn lookup(&self, mac: &MacAddress) -> Option<&'static str> {
        self.resolve(mac.oui())
    }

    /// True if prefixes are strictly ascending (sorted, no duplicates).
    pub fn is_well_formed(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].prefix < w[1].prefix)
    }
}

/// Iterative binary search on the prefix field.
///
/// `probes` is incremented once per table entry compared.
fn search(entries: &[VendorEntry], target: u32, probes: &mut u32) -> Option<usize> {
    let mut left = 0usize;
    let mut right = entries.len();

    while left < right {
        let mid = left + (right - left) / 2;
        *probes += 1;
        let prefix = entries[mid].prefix;
        if prefix == target {
            return Some(mid);
        }
        if prefix < target {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    None
}
