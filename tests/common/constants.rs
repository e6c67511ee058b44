#![allow(dead_code)]

pub const ARTIST_1_NAME: &str = "Daft Punk";
pub const ARTIST_2_NAME: &str = "Massive Attack";

pub const TRACK_1_NAME: &str = "One More Time";
pub const TRACK_1_URI: &str = "spotify:track:0DiWol3AO6WpXZgp0goxAV";
pub const TRACK_2_NAME: &str = "Teardrop";
pub const TRACK_2_URI: &str = "spotify:track:67Hna13dNDkZvBpTXRIaOJ";
pub const TRACK_3_NAME: &str = "Angel";
pub const TRACK_3_URI: &str = "spotify:track:7uv632EkfwYhXoqf8rhYrg";

/// A play nothing in the fake catalog answers to.
pub const UNKNOWN_ARTIST: &str = "Nobody";
pub const UNKNOWN_TRACK: &str = "Nothing";
