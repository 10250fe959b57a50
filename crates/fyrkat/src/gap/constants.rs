// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;

// LE advertising parameters
pub const ADV_IND: u8 = 0x00; // connectable undirected
pub const ADV_INTERVAL_MIN: u16 = 0x00A0; // 100 ms
pub const ADV_INTERVAL_MAX: u16 = 0x00F0; // 150 ms
pub const ADV_CHANNEL_MAP_ALL: u8 = 0x07;
pub const ADV_FILTER_POLICY_ANY: u8 = 0x00;

// Advertising data types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE: u8 = 0x07;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

// Flags octet: LE General Discoverable, BR/EDR not supported
pub const ADV_FLAGS_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
pub const ADV_FLAGS_BREDR_NOT_SUPPORTED: u8 = 0x04;
