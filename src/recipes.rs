// 该文件是 Shicai （食材识别） 项目的一部分。
// src/recipes.rs - 菜谱目录与食材匹配
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Wareless Group

/// 菜谱条目
#[derive(Debug, Clone)]
pub struct Recipe {
  pub id: u32,
  pub name: &'static str,
  pub description: &'static str,
  pub ingredients: &'static [&'static str],
  pub category: &'static str,
}

/// 内置菜谱目录
///
/// 小而固定的静态数据集，食材名称与检测标签共用同一套
/// 自由文本词汇，匹配按大小写不敏感的子串语义进行。
pub const CATALOG: [Recipe; 10] = [
  Recipe {
    id: 1,
    name: "Pasta Tomat Klasik",
    description: "A simple and delicious pasta dish with fresh tomatoes and basil",
    ingredients: &[
      "Pasta",
      "Tomat",
      "Bawang Putih",
      "Olive Oil",
      "Basil",
      "Garam",
      "Merica",
    ],
    category: "Italian",
  },
  Recipe {
    id: 2,
    name: "Tumis Ayam Sayuran",
    description: "Quick and healthy chicken stir fry with vegetables",
    ingredients: &[
      "Ayam",
      "Brokoli",
      "Wortel",
      "Cabai Hijau",
      "Kecap",
      "Bawang Putih",
      "Jahe",
      "Nasi",
    ],
    category: "Asian",
  },
  Recipe {
    id: 3,
    name: "Salad Sayuran Segar",
    description: "Fresh and healthy mixed vegetable salad",
    ingredients: &[
      "Lettuce",
      "Tomat",
      "Timun",
      "Wortel",
      "Cabai Hijau",
      "Olive Oil",
      "Lemon",
      "Garam",
    ],
    category: "Salad",
  },
  Recipe {
    id: 4,
    name: "Smoothie Pisang",
    description: "Creamy and nutritious banana smoothie",
    ingredients: &["Pisang", "Susu", "Madu", "Es"],
    category: "Beverage",
  },
  Recipe {
    id: 5,
    name: "Nasi Goreng Telur",
    description: "Simple and tasty fried rice with eggs",
    ingredients: &[
      "Nasi",
      "Telur",
      "Wortel",
      "Daun Bawang",
      "Bawang Putih",
      "Kecap",
    ],
    category: "Asian",
  },
  Recipe {
    id: 6,
    name: "Sup Kentang",
    description: "Creamy and comforting potato soup",
    ingredients: &[
      "Kentang",
      "Bawang Merah",
      "Bawang Putih",
      "Susu",
      "Mentega",
      "Garam",
      "Merica",
    ],
    category: "Soup",
  },
  Recipe {
    id: 7,
    name: "Osso Buco Ayam",
    description: "Braised chicken with tomatoes and vegetables",
    ingredients: &[
      "Ayam",
      "Tomat",
      "Wortel",
      "Bawang Merah",
      "Bawang Putih",
      "Daun Bawang",
    ],
    category: "Asian",
  },
  Recipe {
    id: 8,
    name: "Tumis Tahu Tempe",
    description: "Stir fried tofu and tempeh with sweet soy sauce",
    ingredients: &[
      "Tahu",
      "Tempe",
      "Bawang Merah",
      "Bawang Putih",
      "Cabai Merah",
      "Kecap Manis",
    ],
    category: "Asian",
  },
  Recipe {
    id: 9,
    name: "Sayur Lodeh",
    description: "Vegetables simmered in coconut milk",
    ingredients: &[
      "Kol",
      "Wortel",
      "Kacang Panjang",
      "Tahu",
      "Tempe",
      "Santan",
      "Bawang Merah",
      "Bawang Putih",
    ],
    category: "Asian",
  },
  Recipe {
    id: 10,
    name: "Capcay",
    description: "Mixed vegetable stir fry with chicken and shrimp",
    ingredients: &[
      "Kol",
      "Wortel",
      "Bawang Putih",
      "Bawang Merah",
      "Cabai Hijau",
      "Ayam",
      "Udang",
    ],
    category: "Asian",
  },
];

/// 按 id 查找菜谱
pub fn recipe_by_id(id: u32) -> Option<&'static Recipe> {
  CATALOG.iter().find(|recipe| recipe.id == id)
}

/// 按名称子串搜索菜谱（大小写不敏感），空查询返回全部
pub fn search_by_name(query: &str) -> Vec<&'static Recipe> {
  let query = query.to_lowercase();
  let query = query.trim();
  if query.is_empty() {
    return CATALOG.iter().collect();
  }

  CATALOG
    .iter()
    .filter(|recipe| recipe.name.to_lowercase().contains(query))
    .collect()
}

/// 双向大小写不敏感的子串匹配
fn ingredient_matches(ingredient: &str, selected: &str) -> bool {
  let ingredient = ingredient.to_lowercase();
  let ingredient = ingredient.trim();
  ingredient.contains(selected) || selected.contains(ingredient)
}

/// 统计菜谱中与任一选中食材匹配的配料数量
fn match_count(recipe: &Recipe, normalized: &[String]) -> usize {
  recipe
    .ingredients
    .iter()
    .filter(|ingredient| {
      normalized
        .iter()
        .any(|selected| ingredient_matches(ingredient, selected))
    })
    .count()
}

/// 按检测到的食材对目录排序
///
/// 匹配数为零的菜谱被整体排除，其余按匹配数降序稳定排列。
pub fn rank_by_ingredients<'a>(catalog: &'a [Recipe], selected: &[String]) -> Vec<&'a Recipe> {
  if selected.is_empty() {
    return Vec::new();
  }

  let normalized: Vec<String> = selected
    .iter()
    .map(|name| name.to_lowercase().trim().to_string())
    .collect();

  let mut matched: Vec<(&Recipe, usize)> = catalog
    .iter()
    .map(|recipe| (recipe, match_count(recipe, &normalized)))
    .filter(|(_, count)| *count > 0)
    .collect();

  matched.sort_by(|a, b| b.1.cmp(&a.1));
  matched.into_iter().map(|(recipe, _)| recipe).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn selected(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn case_insensitive_substring_match_includes_recipe() {
    // 选中 "ayam" 时，["Ayam","Tomat"] 的菜谱入选，
    // 但排在两项都匹配的菜谱之后
    let catalog = [
      Recipe {
        id: 1,
        name: "single",
        description: "",
        ingredients: &["Ayam", "Tomat"],
        category: "",
      },
      Recipe {
        id: 2,
        name: "double",
        description: "",
        ingredients: &["Ayam", "Ayam Kampung"],
        category: "",
      },
    ];

    let one = rank_by_ingredients(&catalog, &selected(&["ayam"]));
    assert_eq!(one.len(), 2);
    assert_eq!(one[0].id, 2);
    assert_eq!(one[1].id, 1);
  }

  #[test]
  fn more_matches_rank_higher() {
    let result = rank_by_ingredients(&CATALOG, &selected(&["ayam", "tomat", "wortel"]));
    assert!(!result.is_empty());
    // Osso Buco Ayam 同时含 Ayam、Tomat、Wortel，应排在最前
    assert_eq!(result[0].name, "Osso Buco Ayam");
  }

  #[test]
  fn zero_match_recipes_are_excluded() {
    let result = rank_by_ingredients(&CATALOG, &selected(&["pisang"]));
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "Smoothie Pisang");
  }

  #[test]
  fn empty_selection_yields_empty_result() {
    assert!(rank_by_ingredients(&CATALOG, &[]).is_empty());
  }

  #[test]
  fn match_is_bidirectional_substring() {
    // 选中项是配料的超串也算匹配
    let catalog = [Recipe {
      id: 1,
      name: "r",
      description: "",
      ingredients: &["Tomat"],
      category: "",
    }];
    let result = rank_by_ingredients(&catalog, &selected(&["tomat ceri"]));
    assert_eq!(result.len(), 1);
  }

  #[test]
  fn recipe_lookup_by_id() {
    assert_eq!(recipe_by_id(4).map(|r| r.name), Some("Smoothie Pisang"));
    assert!(recipe_by_id(99).is_none());
  }

  #[test]
  fn name_search_is_case_insensitive() {
    let result = search_by_name("tumis");
    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|r| r.name.starts_with("Tumis")));

    assert_eq!(search_by_name("").len(), CATALOG.len());
    assert!(search_by_name("rendang").is_empty());
  }
}
