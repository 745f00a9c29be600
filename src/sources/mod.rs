mod payload;
mod traits;

// Networks
pub mod facebook;
pub mod instagram;
pub mod twitter;
pub mod youtube;

pub use payload::{items, parse_offset_date, parse_twitter_date, RawItem};
pub use traits::{FetchContext, SourceAdapter};

/// Adapters in the order a run imports them.
#[must_use]
pub fn default_adapters() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(twitter::TwitterSource::new()),
        Box::new(instagram::InstagramSource::new()),
        Box::new(youtube::YoutubeSource::new()),
        Box::new(facebook::FacebookSource::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    #[test]
    fn test_default_adapter_order() {
        let order: Vec<Source> = default_adapters().iter().map(|a| a.source()).collect();
        assert_eq!(order, Source::ALL);
    }
}
