//! BIP32 派生路径解析
//!
//! 支持两种写法：
//! - 绝对路径：`m/44/0/1/0`（`m` 之后的每一段都是主密钥之下的一步）
//! - 相对路径：`1/0`，自动补全默认前缀 `44/0/0/0`
//!
//! 每段可带 `'` 后缀表示硬化派生；数值支持十进制以及 `0x` / `0b` / `0o` / `0` 前缀。

use std::{fmt, str::FromStr};

/// 硬化派生起始值 2^31
pub const HARDENED_KEY_START: u32 = 0x8000_0000;

/// 相对路径的默认前缀：purpose 44 / coin 0 / account 0 / change 0
pub const DEFAULT_PATH_PREFIX: [u32; 4] = [44, 0, 0, 0];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Derivation path not provided")]
    NotFound,
    #[error("Use 'm/' prefix for absolute paths")]
    InvalidPrefix,
    #[error("Malformed or empty derivation path")]
    Malformed,
    #[error("Invalid element: {0:?}")]
    InvalidElement(String),
    #[error("Element {value} out of allowed range [0, {max}]")]
    OutOfRange { value: String, max: u32 },
    #[error("Element {value} out of allowed hardened range [0, {max}]")]
    OutOfHardenedRange { value: String, max: u32 },
}

/// 单步派生：编码后的子索引 + 硬化标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationStep {
    value: u32,
    hardened: bool,
}

impl DerivationStep {
    pub fn normal(index: u32) -> Self {
        Self {
            value: index,
            hardened: false,
        }
    }

    /// `index` 必须小于 2^31
    pub fn hardened(index: u32) -> Result<Self, PathError> {
        if index >= HARDENED_KEY_START {
            return Err(PathError::OutOfHardenedRange {
                value: index.to_string(),
                max: HARDENED_KEY_START - 1,
            });
        }
        Ok(Self {
            value: index + HARDENED_KEY_START,
            hardened: true,
        })
    }

    /// 编码值（硬化步已加上 2^31）
    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// 编码值落在硬化区间即需要私钥，无论是否写了 `'`
    pub fn requires_private_key(&self) -> bool {
        self.value >= HARDENED_KEY_START
    }
}

impl fmt::Display for DerivationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.value - HARDENED_KEY_START)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// 有序、非空的派生步骤序列
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    steps: Vec<DerivationStep>,
}

impl DerivationPath {
    /// 解析路径字符串
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.trim().is_empty() {
            return Err(PathError::NotFound);
        }

        let mut elements: Vec<&str> = path.split('/').collect();
        let mut steps = Vec::with_capacity(elements.len() + DEFAULT_PATH_PREFIX.len());

        match elements[0].trim() {
            "" => return Err(PathError::InvalidPrefix),
            "m" => {
                elements.remove(0);
            }
            _ => steps.extend(DEFAULT_PATH_PREFIX.iter().copied().map(DerivationStep::normal)),
        }

        if elements.is_empty() {
            return Err(PathError::Malformed);
        }

        for element in elements {
            steps.push(parse_step(element)?);
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[DerivationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 追加一步，返回新路径（原路径不变）
    pub fn child(&self, step: DerivationStep) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(step);
        Self { steps }
    }

    /// 第一个需要私钥的步骤（位置, 步骤）
    pub fn first_private_step(&self) -> Option<(usize, DerivationStep)> {
        self.steps
            .iter()
            .copied()
            .enumerate()
            .find(|(_, step)| step.requires_private_key())
    }

    /// 是否可以仅凭扩展公钥完成派生
    pub fn is_public_derivable(&self) -> bool {
        self.first_private_step().is_none()
    }

    /// 编码值序列
    pub fn values(&self) -> Vec<u32> {
        self.steps.iter().map(DerivationStep::value).collect()
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

fn parse_step(element: &str) -> Result<DerivationStep, PathError> {
    let element = element.trim();

    let (digits, hardened) = match element.strip_suffix('\'') {
        Some(rest) => (rest.trim(), true),
        None => (element, false),
    };

    let max = if hardened {
        HARDENED_KEY_START - 1
    } else {
        u32::MAX
    };

    let out_of_range = |value: String| {
        if hardened {
            PathError::OutOfHardenedRange { value, max }
        } else {
            PathError::OutOfRange { value, max }
        }
    };

    let raw = match parse_integer_literal(digits) {
        Some(Literal::Value(v)) => v,
        Some(Literal::Negative(v)) => return Err(out_of_range(format!("-{}", v))),
        Some(Literal::TooLarge) => return Err(out_of_range(digits.to_string())),
        None => return Err(PathError::InvalidElement(digits.to_string())),
    };

    if raw > u128::from(max) {
        return Err(out_of_range(raw.to_string()));
    }

    // raw <= max <= u32::MAX
    let raw = raw as u32;
    if hardened {
        DerivationStep::hardened(raw)
    } else {
        Ok(DerivationStep::normal(raw))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Literal {
    Value(u128),
    Negative(u128),
    TooLarge,
}

/// 自动识别进制的整数字面量；非数字返回 None
fn parse_integer_literal(text: &str) -> Option<Literal> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(rest) = strip_prefix_ignore_case(body, "0x") {
        (16, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(body, "0b") {
        (2, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(body, "0o") {
        (8, rest)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    // 字符已校验，失败只可能是溢出
    let literal = match u128::from_str_radix(digits, radix) {
        Ok(0) => Literal::Value(0),
        Ok(v) if negative => Literal::Negative(v),
        Ok(v) => Literal::Value(v),
        Err(_) => Literal::TooLarge,
    };
    Some(literal)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(path: &str) -> Vec<u32> {
        DerivationPath::parse(path).unwrap().values()
    }

    #[test]
    fn test_parse_absolute_path() {
        assert_eq!(values("m/44/0/1/0/1"), vec![44, 0, 1, 0, 1]);
        assert_eq!(
            values("m/44'/1/2'"),
            vec![HARDENED_KEY_START + 44, 1, HARDENED_KEY_START + 2]
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let path = "m/44'/0/ 7 /0x10/010";
        let first = DerivationPath::parse(path).unwrap();
        let second = DerivationPath::parse(path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.values(), vec![HARDENED_KEY_START + 44, 0, 7, 16, 8]);
    }

    #[test]
    fn test_relative_path_gets_default_prefix() {
        let suffix = DerivationPath::parse("m/3/9").unwrap();
        let relative = DerivationPath::parse("3/9").unwrap();

        let mut expected = DEFAULT_PATH_PREFIX.to_vec();
        expected.extend(suffix.values());
        assert_eq!(relative.values(), expected);
        assert_eq!(relative.to_string(), "m/44/0/0/0/3/9");
    }

    #[test]
    fn test_hardened_marker() {
        let hardened = DerivationPath::parse("m/44'").unwrap();
        let step = hardened.steps()[0];
        assert!(step.is_hardened());
        assert_eq!(step.value(), HARDENED_KEY_START + 44);
        assert_eq!(step.to_string(), "44'");

        let normal = DerivationPath::parse("m/44").unwrap();
        assert!(!normal.steps()[0].is_hardened());
        assert_eq!(normal.steps()[0].value(), 44);

        // 引号前的空白也允许
        assert_eq!(values("m/ 5 ' "), vec![HARDENED_KEY_START + 5]);
    }

    #[test]
    fn test_prefix_errors() {
        assert_eq!(DerivationPath::parse(""), Err(PathError::NotFound));
        assert_eq!(DerivationPath::parse("   "), Err(PathError::NotFound));
        assert_eq!(DerivationPath::parse("/44/0"), Err(PathError::InvalidPrefix));
        assert_eq!(DerivationPath::parse("m"), Err(PathError::Malformed));
        assert_eq!(DerivationPath::parse(" m "), Err(PathError::Malformed));
    }

    #[test]
    fn test_invalid_elements() {
        assert_eq!(
            DerivationPath::parse("m/44/abc"),
            Err(PathError::InvalidElement("abc".to_string()))
        );
        assert_eq!(
            DerivationPath::parse("m/44//0"),
            Err(PathError::InvalidElement(String::new()))
        );
        assert_eq!(
            DerivationPath::parse("m/0x"),
            Err(PathError::InvalidElement("0x".to_string()))
        );
        assert_eq!(
            DerivationPath::parse("m/09"),
            Err(PathError::InvalidElement("09".to_string()))
        );
        assert!(matches!(
            DerivationPath::parse("m/''"),
            Err(PathError::InvalidElement(_))
        ));
        // 非 ASCII 字符
        assert_eq!(
            DerivationPath::parse("m/44/aé"),
            Err(PathError::InvalidElement("aé".to_string()))
        );
        assert_eq!(
            DerivationPath::parse("m/0é"),
            Err(PathError::InvalidElement("0é".to_string()))
        );
        assert_eq!(
            DerivationPath::parse("m/0xé1"),
            Err(PathError::InvalidElement("0xé1".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_values() {
        // 2^32 非硬化
        assert_eq!(
            DerivationPath::parse("m/4294967296"),
            Err(PathError::OutOfRange {
                value: "4294967296".to_string(),
                max: u32::MAX,
            })
        );
        // 2^31 硬化
        assert_eq!(
            DerivationPath::parse("m/2147483648'"),
            Err(PathError::OutOfHardenedRange {
                value: "2147483648".to_string(),
                max: HARDENED_KEY_START - 1,
            })
        );
        assert!(matches!(
            DerivationPath::parse("m/-1"),
            Err(PathError::OutOfRange { .. })
        ));
        // 超出 u128 也不会截断
        assert!(matches!(
            DerivationPath::parse("m/0xffffffffffffffffffffffffffffffffff"),
            Err(PathError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        assert_eq!(values("m/4294967295"), vec![u32::MAX]);
        assert_eq!(values("m/2147483647'"), vec![u32::MAX]);
        assert_eq!(values("m/-0"), vec![0]);
    }

    #[test]
    fn test_prefixed_literals() {
        assert_eq!(values("m/0x2c/0X2C/0b101/0o17/017/0"), vec![44, 44, 5, 15, 15, 0]);
    }

    #[test]
    fn test_child_does_not_mutate_base() {
        let base = DerivationPath::parse("m/44/0/1/0").unwrap();
        let first = base.child(DerivationStep::normal(1));
        let second = base.child(DerivationStep::normal(2));

        assert_eq!(base.len(), 4);
        assert_eq!(first.to_string(), "m/44/0/1/0/1");
        assert_eq!(second.to_string(), "m/44/0/1/0/2");
    }

    #[test]
    fn test_private_steps_detected() {
        let path = DerivationPath::parse("m/44/0'/1").unwrap();
        let (position, step) = path.first_private_step().unwrap();
        assert_eq!(position, 1);
        assert!(step.is_hardened());
        assert!(!path.is_public_derivable());

        // 未写 ' 但数值落在硬化区间
        let path = DerivationPath::parse("m/2147483648").unwrap();
        assert!(!path.steps()[0].is_hardened());
        assert!(!path.is_public_derivable());

        assert!(DerivationPath::parse("m/44/0/1/0").unwrap().is_public_derivable());
    }
}
