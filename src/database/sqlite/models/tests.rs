use chrono::{Duration, Utc};

use super::*;

fn document_uploaded(uploaded_at: DateTime<Utc>) -> Document {
    Document {
        id: 1,
        document_id: "9b2f".to_string(),
        filename: "handbook.pdf".to_string(),
        uploaded_at,
        chunk_count: 12,
        is_active: true,
    }
}

#[test]
fn age_description() {
    let now = Utc::now();

    assert_eq!(document_uploaded(now).age_description(now), "just now");
    assert_eq!(
        document_uploaded(now - Duration::minutes(5)).age_description(now),
        "5 minutes ago"
    );
    assert_eq!(
        document_uploaded(now - Duration::hours(3)).age_description(now),
        "3 hours ago"
    );
    assert_eq!(
        document_uploaded(now - Duration::days(2)).age_description(now),
        "2 days ago"
    );
}
