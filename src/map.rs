//! Marker selection and category colors for the map views.

use serde::Serialize;

use crate::db::models::DocumentWithCategory;

const COLOR_PALETTE: [&str; 16] = [
    "#3B82F6", "#9333EA", "#10B981", "#F59E0B", "#EC4899", "#6B7280", "#D1D5DB", "#F43F5E",
    "#6366F1", "#34D399", "#EAB308", "#F97316", "#EF4444", "#8B5CF6", "#3B82F6", "#F472B6",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryColor {
    pub id: i64,
    pub primary: String,
    pub light: String,
    pub dark: String,
    pub text: String,
}

impl CategoryColor {
    fn from_primary(id: i64, primary: &str) -> Self {
        Self {
            id,
            primary: primary.to_string(),
            // 8-digit hex: the trailing "20" is the alpha channel.
            light: format!("{primary}20"),
            dark: primary.to_string(),
            text: primary.to_string(),
        }
    }
}

/// Palette entry for a category id. Ids start at 1 and wrap around.
pub fn category_color(id: i64) -> CategoryColor {
    let index = (id - 1).rem_euclid(COLOR_PALETTE.len() as i64) as usize;
    CategoryColor::from_primary(id, COLOR_PALETTE[index])
}

/// Initial view and pan limits for a map of Thailand.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBounds {
    pub center: [f64; 2],
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub bounds: [[f64; 2]; 2],
}

pub const THAILAND_BOUNDS: MapBounds = MapBounds {
    center: [13.736717, 100.523186],
    zoom: 6,
    min_zoom: 5,
    max_zoom: 18,
    bounds: [[6.0, 97.0], [20.0, 106.5]],
};

/// A document as drawn on the map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    #[serde(flatten)]
    pub document: DocumentWithCategory,
    pub color: CategoryColor,
    pub is_latest: bool,
}

/// Keep documents in the selected categories (all of them when nothing is
/// selected), newest first, and flag the newest as latest.
pub fn select_markers(documents: Vec<DocumentWithCategory>, selected: &[i64]) -> Vec<Marker> {
    let mut kept: Vec<DocumentWithCategory> = documents
        .into_iter()
        .filter(|doc| selected.is_empty() || selected.contains(&doc.document.category_id))
        .collect();

    kept.sort_by(|a, b| b.document.created_at.cmp(&a.document.created_at));

    kept.into_iter()
        .enumerate()
        .map(|(index, document)| Marker {
            color: category_color(document.document.category_id),
            is_latest: index == 0,
            document,
        })
        .collect()
}

/// Parse `1,2,3` into category ids, skipping anything that is not a number.
pub fn parse_selection(raw: Option<&str>) -> Vec<i64> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTally {
    pub category_id: i64,
    pub name: String,
    pub count: usize,
    pub color: CategoryColor,
}

/// Count markers per category, in order of first appearance.
pub fn tally(markers: &[Marker]) -> Vec<CategoryTally> {
    let mut tallies: Vec<CategoryTally> = Vec::new();
    for marker in markers {
        let category = &marker.document.category;
        match tallies.iter_mut().find(|t| t.category_id == category.id) {
            Some(t) => t.count += 1,
            None => tallies.push(CategoryTally {
                category_id: category.id,
                name: category.name.clone(),
                count: 1,
                color: category_color(category.id),
            }),
        }
    }
    tallies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Category, Document};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn doc(id: i64, category_id: i64, minute: u32) -> DocumentWithCategory {
        DocumentWithCategory {
            document: Document {
                id,
                title: format!("doc {id}"),
                description: String::new(),
                category_id,
                file_path: format!("/uploads/documents/{id}.pdf"),
                cover_image: None,
                province: String::new(),
                amphoe: String::new(),
                district: String::new(),
                latitude: 0.0,
                longitude: 0.0,
                is_published: true,
                view_count: 0,
                download_count: 0,
                created_at: at(minute),
                updated_at: at(minute),
            },
            category: Category {
                id: category_id,
                name: format!("cat {category_id}"),
                description: None,
                created_at: at(0),
                updated_at: at(0),
            },
        }
    }

    fn ids(markers: &[Marker]) -> Vec<i64> {
        markers.iter().map(|m| m.document.document.id).collect()
    }

    #[test]
    fn empty_selection_shows_everything_newest_first() {
        let markers = select_markers(vec![doc(1, 1, 5), doc(2, 2, 30), doc(3, 1, 10)], &[]);
        assert_eq!(ids(&markers), vec![2, 3, 1]);
        assert!(markers[0].is_latest);
        assert!(markers[1..].iter().all(|m| !m.is_latest));
    }

    #[test]
    fn selection_filters_by_category() {
        let markers = select_markers(vec![doc(1, 1, 5), doc(2, 2, 30), doc(3, 1, 10)], &[1]);
        assert_eq!(ids(&markers), vec![3, 1]);
        assert!(markers[0].is_latest);
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let markers = select_markers(vec![doc(1, 1, 5), doc(2, 1, 5)], &[]);
        assert_eq!(ids(&markers), vec![1, 2]);
    }

    #[test]
    fn no_match_yields_no_markers() {
        assert!(select_markers(vec![doc(1, 1, 5)], &[9]).is_empty());
    }

    #[test]
    fn colors_cycle_through_palette() {
        assert_eq!(category_color(1).primary, "#3B82F6");
        assert_eq!(category_color(2).primary, "#9333EA");
        assert_eq!(category_color(17).primary, "#3B82F6");
        assert_eq!(category_color(1).light, "#3B82F620");
        assert_eq!(category_color(0).primary, "#F472B6");
    }

    #[test]
    fn legend_and_markers_share_category_colors() {
        let markers = select_markers(vec![doc(1, 4, 5), doc(2, 20, 30)], &[]);
        let tallies = tally(&markers);
        for t in &tallies {
            let marker = markers
                .iter()
                .find(|m| m.document.category.id == t.category_id)
                .unwrap();
            assert_eq!(t.color, marker.color);
        }
        assert_eq!(tallies[0].color.primary, COLOR_PALETTE[3]);
        assert_eq!(tallies[1].color.primary, COLOR_PALETTE[3]);
    }

    #[test]
    fn selection_parsing_skips_junk() {
        assert_eq!(parse_selection(Some("1, 2,x,,3")), vec![1, 2, 3]);
        assert!(parse_selection(None).is_empty());
    }

    #[test]
    fn tally_counts_per_category() {
        let markers = select_markers(vec![doc(1, 1, 5), doc(2, 2, 30), doc(3, 1, 10)], &[]);
        let tallies = tally(&markers);
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].category_id, 2);
        assert_eq!(tallies[1].count, 2);
    }

    #[test]
    fn marker_json_is_flat() {
        let markers = select_markers(vec![doc(7, 3, 1)], &[]);
        let json = serde_json::to_value(&markers[0]).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["categoryId"], 3);
        assert_eq!(json["isLatest"], true);
        assert_eq!(json["category"]["name"], "cat 3");
        assert_eq!(json["color"]["primary"], COLOR_PALETTE[2]);
    }
}
