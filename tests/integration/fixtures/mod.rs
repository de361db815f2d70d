// Test fixtures with known Chinese texts, tables and dictionaries
// WHY: conversion tests need deterministic input/output pairs
#![allow(dead_code)]

/// Character table in OpenCC text format
pub const CHARACTER_TABLE: &str = "# test characters
简\t簡
体\t體
测\t測
试\t試
内\t內
这\t這
档\t檔
码\t碼
来\t來
边\t邊
说\t說
够\t夠
发\t發 髮
";

/// Phrase table; phrases take precedence over characters
pub const PHRASE_TABLE: &str = "头发\t頭髮
内存\t記憶體
";

/// Multi-line simplified document with a blank line and CRLF endings
pub const SIMPLIFIED_DOC: &str = "简体测试\r\n\r\n这边说，内存不够。\n头发";

/// SIMPLIFIED_DOC converted with both tables and no custom pairs
pub const TRADITIONAL_DOC: &str = "簡體測試\r\n\r\n這邊說，記憶體不夠。\n頭髮";

/// A user dictionary with a duplicate and a malformed line
pub const USER_DICTIONARY: &str = "代码,程式碼
内存,主記憶體

测试,测驗
bad line
代码,原始碼
";
