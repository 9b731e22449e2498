/**
 * Topic labels derived from the text of a question, and the memory aids filed under
 * each label.
 *
 * Topics are recomputed every time they are needed rather than stored alongside the
 * questions, so that editing the rule table takes effect immediately.
 */
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::quiz::Question;

/// The built-in rule table. A question carries every label whose pattern matches its
/// text, options or explanation, and labels are reported in table order.
pub const TOPIC_RULES: &[(&str, &str)] = &[
    ("交通标志", r"标志|标识|这个标志"),
    ("交通标线", r"标线|虚线|实线|导向线|路面标记"),
    ("交通信号灯", r"信号灯|红灯|绿灯|黄灯|闪光警告"),
    ("灯光使用", r"灯光|远光|近光|雾灯|转向灯|危险报警|示廓灯"),
    ("罚款金额", r"罚款|处\d+元|元以[上下]罚款"),
    ("记分规则", r"扣\d+分|记\d+分|一次记|记分"),
    ("让行规则", r"让行|让路|先行|优先通行|礼让"),
    ("车速规定", r"最高速度|最低速度|时速|限速|超速|车速"),
    ("安全车距", r"车距|跟车距离|保持距离|安全距离"),
    ("超车规定", r"超车|超越|借道超"),
    ("停车规定", r"停车|停放|泊车|禁停|临时停车"),
    ("掉头转弯", r"掉头|调头|转弯|左转|右转"),
    ("高速公路", r"高速公路|高速路|匝道|加速车道|减速车道|应急车道"),
    ("安全带使用", r"安全带|系.*带"),
    ("酒驾醉驾", r"饮酒|醉酒|酒后|醉驾|酒驾"),
    ("肇事逃逸", r"逃逸|肇事逃"),
    ("事故处理", r"事故|碰撞|追尾|刮擦|事故现场"),
    ("恶劣天气", r"雨天|雪天|雾天|冰雪|暴风|大风|泥泞|涉水|湿滑"),
    ("紧急避险", r"爆胎|制动失灵|转向失控|起火|自燃|紧急制动|紧急避险"),
    ("伤员急救", r"急救|伤员|止血|骨折|人工呼吸|心肺复苏"),
    ("危化品运输", r"危险品|危化品|爆炸品|易燃|有毒|腐蚀"),
];

static STANDARD: Lazy<TopicClassifier> = Lazy::new(|| {
    TopicClassifier::new(TOPIC_RULES).expect("built-in topic rules must be valid regexes")
});

#[derive(Debug)]
struct TopicRule {
    label: String,
    pattern: Regex,
}

/// An ordered table of (label, pattern) rules.
#[derive(Debug)]
pub struct TopicClassifier {
    rules: Vec<TopicRule>,
}

impl TopicClassifier {
    pub fn new(rules: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (label, pattern) in rules.iter() {
            compiled.push(TopicRule {
                label: label.to_string(),
                pattern: Regex::new(pattern)?,
            });
        }
        Ok(TopicClassifier { rules: compiled })
    }

    /// The classifier built from `TOPIC_RULES`.
    pub fn standard() -> &'static TopicClassifier {
        &STANDARD
    }

    /// Return every label that applies to `q`, in table order.
    pub fn classify(&self, q: &Question) -> Vec<String> {
        let text = q.search_text();
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(&text))
            .map(|rule| rule.label.clone())
            .collect()
    }

    /// Return `true` if the label `topic` applies to `q`.
    pub fn matches(&self, q: &Question, topic: &str) -> bool {
        match self.rules.iter().find(|rule| rule.label == topic) {
            Some(rule) => rule.pattern.is_match(&q.search_text()),
            None => false,
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.label.as_str())
    }
}

/// A memory aid, e.g. a rhyme for remembering stopping distances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mnemonic {
    pub title: String,
    #[serde(default, alias = "content")]
    pub body: String,
}

/// Mnemonics filed under topic labels. Loaded from `mnemonics.json`, whose top level is
/// an object mapping each label to a list of mnemonics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MnemonicTable {
    by_topic: HashMap<String, Vec<Mnemonic>>,
}

impl MnemonicTable {
    pub fn new(by_topic: HashMap<String, Vec<Mnemonic>>) -> Self {
        MnemonicTable { by_topic }
    }

    pub fn is_empty(&self) -> bool {
        self.by_topic.is_empty()
    }

    /// Return the mnemonics for every topic of `q`, following the classifier's order of
    /// topics and dropping any mnemonic whose title was already seen.
    pub fn for_question(&self, classifier: &TopicClassifier, q: &Question) -> Vec<Mnemonic> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for topic in classifier.classify(q).iter() {
            if let Some(mnemonics) = self.by_topic.get(topic) {
                for m in mnemonics.iter() {
                    if seen.insert(m.title.clone()) {
                        result.push(m.clone());
                    }
                }
            }
        }
        result
    }

    /// Return `true` if some mnemonic is filed under `topic` or under a label that
    /// contains it or is contained by it.
    pub fn has_mnemonic(&self, topic: &str) -> bool {
        self.by_topic.contains_key(topic)
            || self
                .by_topic
                .keys()
                .any(|key| key.contains(topic) || topic.contains(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{QuestionId, QuestionKind};
    use std::convert::TryFrom;

    fn judge(id: u32, text: &str) -> Question {
        let id = QuestionId::try_from(id).unwrap();
        Question::new(id, "综合", QuestionKind::Judge, text, &[], "对").unwrap()
    }

    #[test]
    fn classification_is_multi_label_and_ordered() {
        let q = judge(10001, "夜间超车时应交替使用远近光灯。");
        let topics = TopicClassifier::standard().classify(&q);
        assert_eq!(topics, vec![s("灯光使用"), s("超车规定")]);
    }

    #[test]
    fn explanation_and_options_are_searched() {
        let id = QuestionId::try_from(10002).unwrap();
        let mut q = Question::new(
            id,
            "综合",
            QuestionKind::Single,
            "下列哪种做法正确？",
            &["A、酒后驾驶", "B、按规定行驶"],
            "B",
        )
        .unwrap();
        q.explanation = String::from("违者处200元罚款。");
        let topics = TopicClassifier::standard().classify(&q);
        assert!(topics.contains(&s("酒驾醉驾")));
        assert!(topics.contains(&s("罚款金额")));
    }

    #[test]
    fn custom_rule_tables_can_be_tested_in_isolation() {
        let classifier = TopicClassifier::new(&[("夜间", "夜间|夜晚"), ("雨天", "雨")]).unwrap();
        let q = judge(10003, "夜晚在雨中行车要降低车速。");
        assert_eq!(classifier.classify(&q), vec![s("夜间"), s("雨天")]);
        assert!(classifier.matches(&q, "雨天"));
        assert!(!classifier.matches(&q, "车速规定"));
        assert_eq!(classifier.labels().collect::<Vec<_>>(), vec!["夜间", "雨天"]);
    }

    #[test]
    fn mnemonics_are_deduplicated_by_title() {
        let mut by_topic = HashMap::new();
        by_topic.insert(
            s("灯光使用"),
            vec![mnemonic("会车灯光"), mnemonic("超车口诀")],
        );
        by_topic.insert(
            s("超车规定"),
            vec![mnemonic("超车口诀"), mnemonic("左侧超车")],
        );
        let table = MnemonicTable::new(by_topic);

        let q = judge(10004, "夜间超车时应交替使用远近光灯。");
        let titles: Vec<String> = table
            .for_question(TopicClassifier::standard(), &q)
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec![s("会车灯光"), s("超车口诀"), s("左侧超车")]);
    }

    #[test]
    fn has_mnemonic_matches_related_labels() {
        let mut by_topic = HashMap::new();
        by_topic.insert(s("灯光"), vec![mnemonic("会车灯光")]);
        let table = MnemonicTable::new(by_topic);
        assert!(table.has_mnemonic("灯光使用"));
        assert!(!table.has_mnemonic("超车规定"));
    }

    fn mnemonic(title: &str) -> Mnemonic {
        Mnemonic { title: s(title), body: String::new() }
    }

    fn s(mystr: &str) -> String {
        String::from(mystr)
    }
}
