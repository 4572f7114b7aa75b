//! Per-language grammar registrations and node-kind tables
//!
//! Each supported language registers a [`LanguageSpec`]: the tree-sitter
//! grammar plus the node-kind sets that drive declaration extraction,
//! import/call collection and metric counting. Kind names that a grammar
//! does not produce simply never match, so the tables fail soft across
//! grammar versions.

use crate::domain::types::{ChunkKind, Language};

/// Data-driven description of how one grammar is chunked.
pub struct LanguageSpec {
    /// Which language this spec covers
    pub language: Language,
    /// Grammar constructor
    pub grammar: fn() -> tree_sitter::Language,
    /// Declaration node kinds and the chunk kind they map to
    pub declarations: &'static [(&'static str, ChunkKind)],
    /// Wrapper kinds whose inner declaration is emitted under the outer span
    pub wrappers: &'static [&'static str],
    /// Class-like container kinds; function declarations inside become methods
    pub class_containers: &'static [&'static str],
    /// Import statement kinds
    pub imports: &'static [&'static str],
    /// Call expression kinds
    pub calls: &'static [&'static str],
    /// Decision-point kinds for cyclomatic complexity
    pub decisions: &'static [&'static str],
    /// Structural kinds that raise cognitive-complexity nesting
    pub nesting: &'static [&'static str],
    /// Else/elif-style kinds costing +1 without a nesting multiplier
    pub else_kinds: &'static [&'static str],
    /// Boolean/branching operator token kinds (`&&`, `||`, `??`, `?.`)
    pub bool_operators: &'static [&'static str],
    /// Comment kinds eligible as leading doc comments
    pub comments: &'static [&'static str],
}

fn rust_grammar() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn python_grammar() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

fn javascript_grammar() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn typescript_grammar() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn go_grammar() -> tree_sitter::Language {
    tree_sitter_go::LANGUAGE.into()
}

fn java_grammar() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

fn c_grammar() -> tree_sitter::Language {
    tree_sitter_c::LANGUAGE.into()
}

fn cpp_grammar() -> tree_sitter::Language {
    tree_sitter_cpp::LANGUAGE.into()
}

fn csharp_grammar() -> tree_sitter::Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

fn ruby_grammar() -> tree_sitter::Language {
    tree_sitter_ruby::LANGUAGE.into()
}

fn php_grammar() -> tree_sitter::Language {
    tree_sitter_php::LANGUAGE_PHP.into()
}

fn swift_grammar() -> tree_sitter::Language {
    tree_sitter_swift::LANGUAGE.into()
}

fn kotlin_grammar() -> tree_sitter::Language {
    tree_sitter_kotlin_ng::LANGUAGE.into()
}

static RUST: LanguageSpec = LanguageSpec {
    language: Language::Rust,
    grammar: rust_grammar,
    declarations: &[
        ("function_item", ChunkKind::Function),
        ("struct_item", ChunkKind::Class),
        ("enum_item", ChunkKind::Class),
        ("union_item", ChunkKind::Class),
        ("impl_item", ChunkKind::Class),
        ("trait_item", ChunkKind::Interface),
        ("mod_item", ChunkKind::Module),
        ("macro_definition", ChunkKind::Function),
    ],
    wrappers: &[],
    class_containers: &["impl_item", "trait_item"],
    imports: &["use_declaration"],
    calls: &["call_expression", "macro_invocation"],
    decisions: &[
        "if_expression",
        "while_expression",
        "loop_expression",
        "for_expression",
        "match_arm",
    ],
    nesting: &[
        "if_expression",
        "match_expression",
        "while_expression",
        "loop_expression",
        "for_expression",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||"],
    comments: &["line_comment", "block_comment"],
};

static PYTHON: LanguageSpec = LanguageSpec {
    language: Language::Python,
    grammar: python_grammar,
    declarations: &[
        ("function_definition", ChunkKind::Function),
        ("class_definition", ChunkKind::Class),
    ],
    wrappers: &["decorated_definition"],
    class_containers: &["class_definition"],
    imports: &["import_statement", "import_from_statement"],
    calls: &["call"],
    decisions: &[
        "if_statement",
        "elif_clause",
        "while_statement",
        "for_statement",
        "except_clause",
        "conditional_expression",
        "case_clause",
    ],
    nesting: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "try_statement",
        "with_statement",
        "match_statement",
    ],
    else_kinds: &["else_clause", "elif_clause"],
    bool_operators: &["and", "or"],
    comments: &["comment"],
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    language: Language::JavaScript,
    grammar: javascript_grammar,
    declarations: &[
        ("function_declaration", ChunkKind::Function),
        ("generator_function_declaration", ChunkKind::Function),
        ("class_declaration", ChunkKind::Class),
        ("method_definition", ChunkKind::Method),
    ],
    wrappers: &["export_statement"],
    class_containers: &["class_declaration", "class", "class_body"],
    imports: &["import_statement"],
    calls: &["call_expression", "new_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||", "??", "?.", "optional_chain"],
    comments: &["comment"],
};

static TYPESCRIPT: LanguageSpec = LanguageSpec {
    language: Language::TypeScript,
    grammar: typescript_grammar,
    declarations: &[
        ("function_declaration", ChunkKind::Function),
        ("generator_function_declaration", ChunkKind::Function),
        ("class_declaration", ChunkKind::Class),
        ("abstract_class_declaration", ChunkKind::Class),
        ("method_definition", ChunkKind::Method),
        ("interface_declaration", ChunkKind::Interface),
        ("enum_declaration", ChunkKind::Class),
        ("internal_module", ChunkKind::Module),
    ],
    wrappers: &["export_statement", "ambient_declaration"],
    class_containers: &[
        "class_declaration",
        "abstract_class_declaration",
        "class",
        "class_body",
    ],
    imports: &["import_statement"],
    calls: &["call_expression", "new_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||", "??", "?.", "optional_chain"],
    comments: &["comment"],
};

static GO: LanguageSpec = LanguageSpec {
    language: Language::Go,
    grammar: go_grammar,
    declarations: &[
        ("function_declaration", ChunkKind::Function),
        ("method_declaration", ChunkKind::Method),
        ("type_declaration", ChunkKind::Class),
    ],
    wrappers: &[],
    class_containers: &[],
    imports: &["import_declaration"],
    calls: &["call_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
        "default_case",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "expression_switch_statement",
        "type_switch_statement",
        "select_statement",
    ],
    else_kinds: &[],
    bool_operators: &["&&", "||"],
    comments: &["comment"],
};

static JAVA: LanguageSpec = LanguageSpec {
    language: Language::Java,
    grammar: java_grammar,
    declarations: &[
        ("class_declaration", ChunkKind::Class),
        ("record_declaration", ChunkKind::Class),
        ("enum_declaration", ChunkKind::Class),
        ("interface_declaration", ChunkKind::Interface),
        ("method_declaration", ChunkKind::Method),
        ("constructor_declaration", ChunkKind::Method),
    ],
    wrappers: &[],
    class_containers: &[
        "class_declaration",
        "record_declaration",
        "enum_declaration",
        "interface_declaration",
        "class_body",
    ],
    imports: &["import_declaration"],
    calls: &["method_invocation", "object_creation_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "enhanced_for_statement",
        "while_statement",
        "do_statement",
        "switch_block_statement_group",
        "catch_clause",
        "ternary_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "enhanced_for_statement",
        "while_statement",
        "do_statement",
        "switch_expression",
        "catch_clause",
    ],
    else_kinds: &[],
    bool_operators: &["&&", "||"],
    comments: &["line_comment", "block_comment"],
};

static C: LanguageSpec = LanguageSpec {
    language: Language::C,
    grammar: c_grammar,
    declarations: &[
        ("function_definition", ChunkKind::Function),
        ("struct_specifier", ChunkKind::Class),
        ("enum_specifier", ChunkKind::Class),
        ("union_specifier", ChunkKind::Class),
    ],
    wrappers: &[],
    class_containers: &[],
    imports: &["preproc_include"],
    calls: &["call_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "do_statement",
        "case_statement",
        "conditional_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||"],
    comments: &["comment"],
};

static CPP: LanguageSpec = LanguageSpec {
    language: Language::Cpp,
    grammar: cpp_grammar,
    declarations: &[
        ("function_definition", ChunkKind::Function),
        ("class_specifier", ChunkKind::Class),
        ("struct_specifier", ChunkKind::Class),
        ("enum_specifier", ChunkKind::Class),
        ("namespace_definition", ChunkKind::Module),
        ("template_declaration", ChunkKind::Function),
    ],
    wrappers: &[],
    class_containers: &["class_specifier", "struct_specifier"],
    imports: &["preproc_include"],
    calls: &["call_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "for_range_loop",
        "while_statement",
        "do_statement",
        "case_statement",
        "catch_clause",
        "conditional_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "for_range_loop",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||"],
    comments: &["comment"],
};

static CSHARP: LanguageSpec = LanguageSpec {
    language: Language::CSharp,
    grammar: csharp_grammar,
    declarations: &[
        ("class_declaration", ChunkKind::Class),
        ("struct_declaration", ChunkKind::Class),
        ("record_declaration", ChunkKind::Class),
        ("enum_declaration", ChunkKind::Class),
        ("interface_declaration", ChunkKind::Interface),
        ("method_declaration", ChunkKind::Method),
        ("constructor_declaration", ChunkKind::Method),
        ("local_function_statement", ChunkKind::Function),
        ("namespace_declaration", ChunkKind::Module),
    ],
    wrappers: &[],
    class_containers: &[
        "class_declaration",
        "struct_declaration",
        "record_declaration",
        "interface_declaration",
        "declaration_list",
    ],
    imports: &["using_directive"],
    calls: &["invocation_expression", "object_creation_expression"],
    decisions: &[
        "if_statement",
        "for_statement",
        "for_each_statement",
        "while_statement",
        "do_statement",
        "switch_section",
        "catch_clause",
        "conditional_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "for_each_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
    ],
    else_kinds: &["else_clause"],
    bool_operators: &["&&", "||", "??", "?.", "optional_chain"],
    comments: &["comment"],
};

static RUBY: LanguageSpec = LanguageSpec {
    language: Language::Ruby,
    grammar: ruby_grammar,
    declarations: &[
        ("method", ChunkKind::Function),
        ("singleton_method", ChunkKind::Method),
        ("class", ChunkKind::Class),
        ("module", ChunkKind::Module),
    ],
    wrappers: &[],
    class_containers: &["class", "module"],
    imports: &["call"],
    calls: &["call", "method_call"],
    decisions: &[
        "if",
        "unless",
        "elsif",
        "while",
        "until",
        "for",
        "when",
        "rescue",
        "conditional",
    ],
    nesting: &["if", "unless", "while", "until", "for", "case", "begin"],
    else_kinds: &["else", "elsif"],
    bool_operators: &["&&", "||", "and", "or"],
    comments: &["comment"],
};

static PHP: LanguageSpec = LanguageSpec {
    language: Language::Php,
    grammar: php_grammar,
    declarations: &[
        ("function_definition", ChunkKind::Function),
        ("method_declaration", ChunkKind::Method),
        ("class_declaration", ChunkKind::Class),
        ("trait_declaration", ChunkKind::Class),
        ("enum_declaration", ChunkKind::Class),
        ("interface_declaration", ChunkKind::Interface),
    ],
    wrappers: &[],
    class_containers: &["class_declaration", "trait_declaration", "declaration_list"],
    imports: &[
        "namespace_use_declaration",
        "include_expression",
        "include_once_expression",
        "require_expression",
        "require_once_expression",
    ],
    calls: &[
        "function_call_expression",
        "member_call_expression",
        "scoped_call_expression",
        "object_creation_expression",
    ],
    decisions: &[
        "if_statement",
        "else_if_clause",
        "for_statement",
        "foreach_statement",
        "while_statement",
        "do_statement",
        "case_statement",
        "catch_clause",
        "conditional_expression",
        "match_conditional_expression",
    ],
    nesting: &[
        "if_statement",
        "for_statement",
        "foreach_statement",
        "while_statement",
        "do_statement",
        "switch_statement",
        "catch_clause",
        "match_expression",
    ],
    else_kinds: &["else_clause", "else_if_clause"],
    bool_operators: &["&&", "||", "and", "or", "??"],
    comments: &["comment"],
};

static SWIFT: LanguageSpec = LanguageSpec {
    language: Language::Swift,
    grammar: swift_grammar,
    declarations: &[
        ("function_declaration", ChunkKind::Function),
        ("class_declaration", ChunkKind::Class),
        ("protocol_declaration", ChunkKind::Interface),
        ("init_declaration", ChunkKind::Method),
    ],
    wrappers: &[],
    class_containers: &["class_declaration", "class_body", "protocol_declaration"],
    imports: &["import_declaration"],
    calls: &["call_expression"],
    decisions: &[
        "if_statement",
        "guard_statement",
        "for_statement",
        "while_statement",
        "repeat_while_statement",
        "switch_entry",
        "catch_block",
        "ternary_expression",
    ],
    nesting: &[
        "if_statement",
        "guard_statement",
        "for_statement",
        "while_statement",
        "repeat_while_statement",
        "switch_statement",
        "catch_block",
    ],
    else_kinds: &[],
    bool_operators: &["&&", "||", "??"],
    comments: &["comment", "multiline_comment"],
};

static KOTLIN: LanguageSpec = LanguageSpec {
    language: Language::Kotlin,
    grammar: kotlin_grammar,
    declarations: &[
        ("function_declaration", ChunkKind::Function),
        ("class_declaration", ChunkKind::Class),
        ("object_declaration", ChunkKind::Class),
    ],
    wrappers: &[],
    class_containers: &["class_declaration", "object_declaration", "class_body"],
    imports: &["import", "import_header"],
    calls: &["call_expression"],
    decisions: &[
        "if_expression",
        "when_entry",
        "for_statement",
        "while_statement",
        "do_while_statement",
        "catch_block",
    ],
    nesting: &[
        "if_expression",
        "when_expression",
        "for_statement",
        "while_statement",
        "do_while_statement",
        "catch_block",
    ],
    else_kinds: &[],
    bool_operators: &["&&", "||", "?:"],
    comments: &["line_comment", "multiline_comment"],
};

/// Look up the chunking spec for a language, if a grammar is wired.
///
/// Scala, the markup formats and `Unknown` return `None` and flow through
/// the non-AST chunkers.
pub fn language_spec(language: Language) -> Option<&'static LanguageSpec> {
    match language {
        Language::Rust => Some(&RUST),
        Language::Python => Some(&PYTHON),
        Language::JavaScript => Some(&JAVASCRIPT),
        Language::TypeScript => Some(&TYPESCRIPT),
        Language::Go => Some(&GO),
        Language::Java => Some(&JAVA),
        Language::C => Some(&C),
        Language::Cpp => Some(&CPP),
        Language::CSharp => Some(&CSHARP),
        Language::Ruby => Some(&RUBY),
        Language::Php => Some(&PHP),
        Language::Swift => Some(&SWIFT),
        Language::Kotlin => Some(&KOTLIN),
        Language::Scala | Language::Vue | Language::Liquid | Language::Unknown => None,
    }
}
