// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use galleryze::categories::CategoryMap;
use galleryze::checkpoint::parse_checkpoint;
use galleryze::index::CategorizedIndex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(value) = parse_checkpoint(text) {
        assert!(value.is_finite() && value >= 0.0);
    }

    if let Ok(map) = CategoryMap::from_json_str(text) {
        for category in map.categories() {
            assert!(map.keywords_for(category).iter().all(|k| *k == k.to_lowercase()));
        }
    }

    if let Ok(mut index) = CategorizedIndex::from_json_str(text) {
        let before = index.total();
        index.record("Others", "/fuzz.jpg");
        assert!(index.total() <= before + 1);
    }
});
