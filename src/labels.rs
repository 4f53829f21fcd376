// 该文件是 Shicai （食材识别） 项目的一部分。
// src/labels.rs - 食材类别标签
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

/// 默认食材类别名称（印尼语）
///
/// 与模型训练时的类别顺序一致，顺序决定类别索引。
pub const INGREDIENT_CLASSES: [&str; 21] = [
  "Ayam",
  "Bawang Merah",
  "Bawang Putih",
  "Bayam",
  "Cabai Hijau",
  "Cabai Merah",
  "Daging Kambing",
  "Daging Sapi",
  "Daun Bawang",
  "Ikan",
  "Kacang Panjang",
  "Kangkung",
  "Kol",
  "Nasi",
  "Tahu",
  "Telur",
  "Tempe",
  "Terong",
  "Tomat",
  "Udang",
  "Wortel",
];

/// 返回默认标签列表
pub fn default_labels() -> Vec<String> {
  INGREDIENT_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// 从标签文件文本解析类别名称
///
/// 每行一个标签，去除首尾空白并丢弃空行；解析结果为空时
/// 回退到内置默认标签列表。
pub fn parse_labels(text: &str) -> Vec<String> {
  let parsed: Vec<String> = text
    .lines()
    .map(|line| line.trim())
    .filter(|line| !line.is_empty())
    .map(|line| line.to_string())
    .collect();

  if parsed.is_empty() {
    default_labels()
  } else {
    parsed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_trims_and_drops_empty_lines() {
    let labels = parse_labels("Ayam\n  Tomat  \n\nWortel\n");
    assert_eq!(labels, vec!["Ayam", "Tomat", "Wortel"]);
  }

  #[test]
  fn empty_text_falls_back_to_defaults() {
    let labels = parse_labels("\n  \n");
    assert_eq!(labels.len(), INGREDIENT_CLASSES.len());
    assert_eq!(labels[0], "Ayam");
  }

  #[test]
  fn default_list_has_21_classes() {
    assert_eq!(default_labels().len(), 21);
  }
}
