//! Reference text for the mapping language, printed by `etlmap operators`.

/// Transformation types, composite operators and expression grammar.
pub fn operators_description() -> String {
    r#"Transformation types (transformationType):

| Type | Result |
|------|--------|
| constant | `value` if non-blank, else `defaultValue` |
| source | value of `sourceField` (case-insensitive), else `defaultValue` |
| composite | `transform` applied to `sources` |
| conditional | first matching branch of `conditions[0]`, else `defaultValue` |
| blank | `defaultValue` (also used for unknown types) |

Composite operators (transform):

| Operator | Synonyms | Description |
|----------|----------|-------------|
| sum | - | numeric sum, non-numeric counts as 0 |
| avg | average | sum divided by the number of sources |
| min | minimum | smallest numeric value, non-numeric skipped |
| max | maximum | largest numeric value, non-numeric skipped |
| concat | - | values joined with `delimiter` (missing = "") |
| upper | uppercase | first source in upper case |
| lower | lowercase | first source in lower case |
| trim | - | first source without surrounding whitespace |

Expressions (ifExpr):

  expr    := and ( "||" and )*
  and     := clause ( "&&" clause )*
  clause  := [ "!" ] ( in | between | like | compare )
  in      := field IN ( v1, v2, ... )          exact-case match, quotes optional
  between := field BETWEEN lo AND hi           numeric, inclusive
  like    := field LIKE 'pattern'              % = any run, _ = one character
  compare := field ( == | = | != | < | > | <= | >= ) value
                                               unquoted null tests for absence

Field names are letters, digits, `_`, `.` and `-` (a leading digit is fine).
No parentheses. A clause that matches none of these forms is false.

Example field mapping (YAML):

  - targetField: account_class
    targetPosition: 42
    length: 16
    transformationType: conditional
    conditions:
      - ifExpr: "acct_type IN ('CHK', 'DDA')"
        then: CHECKING
        elseIfExprs:
          - ifExpr: "acct_type LIKE 'SAV%' && balance >= 10000"
            then: PREMIUM_SAVINGS
        elseExpr: OTHER"#
        .to_string()
}
