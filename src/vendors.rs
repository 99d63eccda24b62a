// Generated by oui-gen. Do not edit by hand.
// Regenerate: oui-gen --input index.json --output src/vendors.rs
// Entries: 23

use crate::oui::VendorEntry;

/// Compiled OUI table, strictly ascending by prefix.
pub static OUI_TABLE: &[VendorEntry] = &[
    VendorEntry::new(0x00000C, "Cisco Systems, Inc"),
    VendorEntry::new(0x000393, "Apple, Inc."),
    VendorEntry::new(0x000A95, "Apple, Inc."),
    VendorEntry::new(0x000C29, "VMware, Inc."),
    VendorEntry::new(0x001247, "Samsung Electronics Co.,Ltd"),
    VendorEntry::new(0x00155D, "Microsoft Corporation"),
    VendorEntry::new(0x001788, "Philips Lighting BV"),
    VendorEntry::new(0x0017F2, "Apple, Inc."),
    VendorEntry::new(0x00408C, "Axis Communications AB"),
    VendorEntry::new(0x005056, "VMware, Inc."),
    VendorEntry::new(0x0050F2, "Microsoft Corp."),
    VendorEntry::new(0x08EA40, "SHENZHEN BILIAN ELECTRONIC ..."),
    VendorEntry::new(0x240AC4, "Espressif Inc."),
    VendorEntry::new(0x24B2DE, "Espressif Inc."),
    VendorEntry::new(0x30AEA4, "Espressif Inc."),
    VendorEntry::new(0x3C71BF, "Espressif Inc."),
    VendorEntry::new(0x588E81, "Silicon Laboratories"),
    VendorEntry::new(0xB41E52, "Flock Safety"),
    VendorEntry::new(0xB827EB, "Raspberry Pi Foundation"),
    VendorEntry::new(0xCCCCCC, "Silicon Laboratories"),
    VendorEntry::new(0xDCA632, "Raspberry Pi Trading Ltd"),
    VendorEntry::new(0xE45F01, "Raspberry Pi Trading Ltd"),
    VendorEntry::new(0xF4F5E8, "Google, Inc."),
];
