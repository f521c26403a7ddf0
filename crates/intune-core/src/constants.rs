/// Weight of the genre Jaccard ratio in the combined score.
pub const GENRE_WEIGHT: f64 = 0.3;

/// Weight of the artist Jaccard ratio in the combined score.
pub const ARTIST_WEIGHT: f64 = 0.4;

/// Weight of the track Jaccard ratio in the combined score.
pub const TRACK_WEIGHT: f64 = 0.3;

/// Tolerance when checking that a weight set sums to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Decimal places kept on a similarity score
pub const SCORE_DECIMALS: i32 = 2;

/// Longest message a proposal may carry, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Upper bound for recommendation, feed and search page sizes.
pub const MAX_PAGE_SIZE: usize = 50;

/// Favorite tracks attached to each recommendation.
pub const TOP_TRACKS_PER_RECOMMENDATION: usize = 3;

// Field length limits mirrored by the store schema.
pub const MAX_USERNAME_CHARS: usize = 50;
pub const MAX_EMAIL_CHARS: usize = 100;
pub const MAX_HANDLE_CHARS: usize = 100;
pub const MAX_URL_CHARS: usize = 500;
pub const MAX_SONG_FIELD_CHARS: usize = 200;
pub const MAX_GENRE_CHARS: usize = 100;

/// Inclusive bounds of a song rating.
pub const RATING_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;
