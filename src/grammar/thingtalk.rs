// ============================================================
// Grammar — ThingTalk
// ============================================================
// Compiles the Thingpedia rule listing into an automaton over
// ThingTalk program tokens.
//
// Input format (one rule per line, whitespace separated):
//   trigger tt:twitter.source from Username text String
//   action  tt:twitter.post status String
//   device  tt:device.twitter
//   entity  tt:stock_id
//
// Accepted programs:
//   special <special-id>
//   answer  <value> [<unit>]
//   command help <device | generic>
//   command list <category>
//   trigger|query|action <fn> (<param> <op> <value> [<unit>])*
//   rule (<trigger-inv> [<query-inv>] | <query-inv>) <action-inv>
//
// Operators depend on the parameter type and on whether the
// invocation is an action (actions only take `is`). Inside a
// rule, query and action parameters may also be given the name
// of any trigger or query parameter (parameter passing).
//
// Reference: Thingpedia device schema, ThingTalk seq2seq format

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::errors::SetupError;
use crate::domain::grammar::{Grammar, GrammarState, OutputVocabulary};
use crate::grammar::automaton::{FiniteStateGrammar, FiniteStateGrammarBuilder};

/// Number of placeholder slots per entity type (QUOTED_STRING_0..4, ...)
pub const ENTITY_SLOTS: usize = 5;

const SPECIALS: &[&str] = &[
    "tt:root.special.yes",
    "tt:root.special.no",
    "tt:root.special.nevermind",
    "tt:root.special.failed",
    "tt:root.special.hello",
    "tt:root.special.thankyou",
    "tt:root.special.sorry",
    "tt:root.special.cool",
    "tt:root.special.debug",
    "tt:root.special.help",
];

const RELATIVE_LOCATIONS: &[&str] = &[
    "location:current_location",
    "location:home",
    "location:work",
];

const LIST_CATEGORIES: &[&str] = &["device", "trigger", "query", "action"];

const UNIT_FAMILIES: &[&[&str]] = &[
    &["ms", "s", "min", "h", "day", "week", "mon", "year"],
    &["m", "km", "mm", "cm", "mi", "in", "ft"],
    &["mps", "kmph", "mph"],
    &["kg", "g", "lb", "oz"],
    &["C", "F", "K"],
    &["kcal", "kJ"],
    &["byte", "KB", "MB", "GB", "TB"],
];

/// Placeholder families the dataset converter can produce.
const VALUE_PLACEHOLDERS: &[&str] = &[
    "QUOTED_STRING", "NUMBER", "DATE", "TIME", "LOCATION", "USERNAME",
    "HASHTAG", "PHONE_NUMBER", "EMAIL_ADDRESS", "URL", "DURATION",
];

fn slots(prefix: &str) -> impl Iterator<Item = String> + '_ {
    (0..ENTITY_SLOTS).map(move |i| format!("{prefix}_{i}"))
}

fn unit_family(unit: &str) -> Vec<&str> {
    UNIT_FAMILIES
        .iter()
        .find(|family| family.contains(&unit))
        .map(|family| family.to_vec())
        .unwrap_or_else(|| vec![unit])
}

fn is_time_unit(unit: &str) -> bool {
    UNIT_FAMILIES[0].contains(&unit)
}

// ─── Thingpedia types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Trigger,
    Query,
    Action,
}

impl FunctionKind {
    pub fn keyword(self) -> &'static str {
        match self {
            FunctionKind::Trigger => "trigger",
            FunctionKind::Query   => "query",
            FunctionKind::Action  => "action",
        }
    }

    fn parse(word: &str) -> Option<Self> {
        match word {
            "trigger" => Some(FunctionKind::Trigger),
            "query"   => Some(FunctionKind::Query),
            "action"  => Some(FunctionKind::Action),
            _         => None,
        }
    }
}

/// Type of a Thingpedia parameter as written in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Date,
    Time,
    Location,
    Username,
    Hashtag,
    PhoneNumber,
    EmailAddress,
    Url,
    Measure(String),
    Enum(Vec<String>),
    Entity(String),
    Array(Box<ParamType>),
    Other(String),
}

impl ParamType {
    pub fn parse(text: &str) -> Self {
        fn inner<'a>(text: &'a str, head: &str) -> Option<&'a str> {
            text.strip_prefix(head)?.strip_prefix('(')?.strip_suffix(')')
        }

        if let Some(unit) = inner(text, "Measure") {
            return ParamType::Measure(unit.to_string());
        }
        if let Some(members) = inner(text, "Enum") {
            return ParamType::Enum(members.split(',').map(|m| m.trim().to_string()).collect());
        }
        if let Some(entity) = inner(text, "Entity") {
            return ParamType::Entity(entity.to_string());
        }
        if let Some(elem) = inner(text, "Array") {
            return ParamType::Array(Box::new(ParamType::parse(elem)));
        }
        match text {
            "String"                => ParamType::String,
            "Number"                => ParamType::Number,
            "Boolean" | "Bool"      => ParamType::Boolean,
            "Date"                  => ParamType::Date,
            "Time"                  => ParamType::Time,
            "Location"              => ParamType::Location,
            "Username"              => ParamType::Username,
            "Hashtag"               => ParamType::Hashtag,
            "PhoneNumber"           => ParamType::PhoneNumber,
            "EmailAddress"          => ParamType::EmailAddress,
            "URL"                   => ParamType::Url,
            other                   => ParamType::Other(other.to_string()),
        }
    }

    /// Operators an argument of this type may use. Action arguments are
    /// assignments and only take `is`, whatever the type.
    fn operators(&self, is_action: bool) -> Vec<&'static str> {
        if is_action {
            return vec!["is"];
        }
        match self {
            ParamType::Array(_)   => vec!["has"],
            ParamType::String     => vec!["is", "contains"],
            ParamType::Number
            | ParamType::Measure(_) => vec!["is", ">", "<"],
            _                     => vec!["is"],
        }
    }

    /// Literal value tokens, excluding the NUMBER slots of a measure
    /// (those are followed by a unit and handled separately).
    fn literal_values(&self) -> Vec<String> {
        match self {
            ParamType::String       => slots("QUOTED_STRING").collect(),
            ParamType::Number       => slots("NUMBER").collect(),
            ParamType::Boolean      => vec!["true".into(), "false".into()],
            ParamType::Date         => slots("DATE").collect(),
            ParamType::Time         => slots("TIME").collect(),
            ParamType::Location     => slots("LOCATION")
                .chain(RELATIVE_LOCATIONS.iter().map(|s| s.to_string()))
                .collect(),
            ParamType::Username     => slots("USERNAME").collect(),
            ParamType::Hashtag      => slots("HASHTAG").collect(),
            ParamType::PhoneNumber  => slots("PHONE_NUMBER").collect(),
            ParamType::EmailAddress => slots("EMAIL_ADDRESS").collect(),
            ParamType::Url          => slots("URL").collect(),
            ParamType::Measure(unit) if is_time_unit(unit) => slots("DURATION").collect(),
            ParamType::Measure(_)   => Vec::new(),
            ParamType::Enum(members) => members.clone(),
            ParamType::Entity(kind) => slots(&format!("GENERIC_ENTITY_{kind}")).collect(),
            ParamType::Array(elem)  => elem.literal_values(),
            ParamType::Other(_)     => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub kind:   FunctionKind,
    pub name:   String,
    pub params: Vec<(String, ParamType)>,
}

/// Parsed Thingpedia listing.
#[derive(Debug, Clone, Default)]
pub struct Thingpedia {
    pub functions: Vec<Function>,
    pub devices:   Vec<String>,
    pub entities:  Vec<String>,
}

impl Thingpedia {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read Thingpedia rules from '{}'", path.display()))?;
        Ok(Self::parse(&text)?)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, SetupError> {
        let mut tp = Thingpedia::default();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() || words[0].starts_with('#') {
                continue;
            }
            let malformed = |reason: &str| SetupError::MalformedRule {
                line:   line_no,
                reason: reason.to_string(),
            };
            let name = words.get(1).ok_or_else(|| malformed("missing name"))?;

            match words[0] {
                "device" => tp.devices.push(name.to_string()),
                "entity" => tp.entities.push(name.to_string()),
                word => {
                    let kind = FunctionKind::parse(word)
                        .ok_or_else(|| malformed(&format!("unknown rule type '{word}'")))?;
                    let rest = &words[2..];
                    if rest.len() % 2 != 0 {
                        return Err(malformed("parameter without a type"));
                    }
                    let params = rest
                        .chunks(2)
                        .map(|pair| (pair[0].to_string(), ParamType::parse(pair[1])))
                        .collect();
                    tp.functions.push(Function { kind, name: name.to_string(), params });
                }
            }
        }
        Ok(tp)
    }

    fn of_kind(&self, kind: FunctionKind) -> impl Iterator<Item = usize> + '_ {
        self.functions
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.kind == kind)
            .map(|(i, _)| i)
    }
}

// ─── ThingtalkGrammar ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ThingtalkGrammar {
    inner: FiniteStateGrammar,
}

impl ThingtalkGrammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let thingpedia = Thingpedia::from_file(path)?;
        let grammar = Self::new(&thingpedia);
        tracing::info!(
            "Compiled ThingTalk grammar from '{}': {} functions, {} devices, {} entity types, {} output tokens, {} states",
            path.display(),
            thingpedia.functions.len(),
            thingpedia.devices.len(),
            thingpedia.entities.len(),
            grammar.output_size(),
            grammar.inner.num_states(),
        );
        Ok(grammar)
    }

    pub fn new(thingpedia: &Thingpedia) -> Self {
        Self { inner: Compiler::new(thingpedia).compile() }
    }
}

impl Grammar for ThingtalkGrammar {
    fn vocabulary(&self) -> &OutputVocabulary {
        self.inner.vocabulary()
    }

    fn initial_state(&self) -> GrammarState {
        self.inner.initial_state()
    }

    fn valid_tokens(&self, state: GrammarState) -> &[usize] {
        self.inner.valid_tokens(state)
    }

    fn advance(&self, state: GrammarState, token: usize) -> Option<GrammarState> {
        self.inner.advance(state, token)
    }
}

// ─── Compiler ─────────────────────────────────────────────────────────────────

/// Where an invocation sits in the program; decides what may follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Top,
    RuleTrigger,
    RuleQuery,
    RuleAction,
}

impl Phase {
    fn allows_var_refs(self) -> bool {
        matches!(self, Phase::RuleQuery | Phase::RuleAction)
    }
}

struct Compiler<'a> {
    tp:          &'a Thingpedia,
    builder:     FiniteStateGrammarBuilder,
    invocations: HashMap<(usize, Phase), usize>,
    var_refs:    Vec<String>,
}

impl<'a> Compiler<'a> {
    fn new(tp: &'a Thingpedia) -> Self {
        let mut var_refs: Vec<String> = tp
            .functions
            .iter()
            .filter(|f| f.kind != FunctionKind::Action)
            .flat_map(|f| f.params.iter().map(|(name, _)| name.clone()))
            .collect();
        var_refs.sort();
        var_refs.dedup();

        Self {
            tp,
            builder: FiniteStateGrammar::builder(OutputVocabulary::new(Vec::<String>::new())),
            invocations: HashMap::new(),
            var_refs,
        }
    }

    fn compile(mut self) -> FiniteStateGrammar {
        let start = self.builder.initial();
        let done = self.builder.add_state();
        self.builder.accept(done);

        self.add_special(start, done);
        self.add_answer(start, done);
        self.add_command(start, done);
        self.add_top_level(start);
        self.add_rule(start);

        self.builder.build()
    }

    fn add_special(&mut self, start: usize, done: usize) {
        let s = self.builder.add_state();
        self.builder.add_transition(start, "special", s);
        for special in SPECIALS {
            self.builder.add_transition(s, special, done);
        }
    }

    fn add_answer(&mut self, start: usize, done: usize) {
        let s = self.builder.add_state();
        let number = self.builder.add_state();
        self.builder.add_transition(start, "answer", s);

        let mut values: Vec<String> = VALUE_PLACEHOLDERS
            .iter()
            .filter(|&&p| p != "NUMBER")
            .flat_map(|&p| slots(p))
            .collect();
        values.extend(["true", "false"].map(String::from));
        values.extend(RELATIVE_LOCATIONS.iter().map(|s| s.to_string()));
        for entity in &self.tp.entities {
            values.extend(slots(&format!("GENERIC_ENTITY_{entity}")));
        }
        for value in &values {
            self.builder.add_transition(s, value, done);
        }

        // a bare number, optionally followed by a unit
        for value in slots("NUMBER") {
            self.builder.add_transition(s, &value, number);
        }
        self.builder.accept(number);
        for unit in UNIT_FAMILIES.iter().flat_map(|f| f.iter()) {
            self.builder.add_transition(number, unit, done);
        }
    }

    fn add_command(&mut self, start: usize, done: usize) {
        let s = self.builder.add_state();
        let help = self.builder.add_state();
        let list = self.builder.add_state();
        self.builder.add_transition(start, "command", s);
        self.builder.add_transition(s, "help", help);
        self.builder.add_transition(s, "list", list);

        self.builder.add_transition(help, "generic", done);
        for device in &self.tp.devices {
            self.builder.add_transition(help, device, done);
        }
        for category in LIST_CATEGORIES {
            self.builder.add_transition(list, category, done);
        }
    }

    fn add_top_level(&mut self, start: usize) {
        for kind in [FunctionKind::Trigger, FunctionKind::Query, FunctionKind::Action] {
            let s = self.builder.add_state();
            self.builder.add_transition(start, kind.keyword(), s);
            for f in self.tp.of_kind(kind).collect::<Vec<_>>() {
                let inv = self.invocation(f, Phase::Top);
                self.builder.add_transition(s, &self.tp.functions[f].name, inv);
                self.builder.accept(inv);
            }
        }
    }

    fn add_rule(&mut self, start: usize) {
        let triggers: Vec<usize> = self.tp.of_kind(FunctionKind::Trigger).collect();
        let queries: Vec<usize> = self.tp.of_kind(FunctionKind::Query).collect();
        let actions: Vec<usize> = self.tp.of_kind(FunctionKind::Action).collect();

        let rule = self.builder.add_state();
        self.builder.add_transition(start, "rule", rule);

        for &t in &triggers {
            self.chain(rule, t, Phase::RuleTrigger);
        }
        for &q in &queries {
            self.chain(rule, q, Phase::RuleQuery);
        }
        for &t in &triggers {
            let from = self.invocation(t, Phase::RuleTrigger);
            for &q in &queries {
                self.chain(from, q, Phase::RuleQuery);
            }
            for &a in &actions {
                self.chain(from, a, Phase::RuleAction);
            }
        }
        for &q in &queries {
            let from = self.invocation(q, Phase::RuleQuery);
            for &a in &actions {
                self.chain(from, a, Phase::RuleAction);
            }
        }
        for &a in &actions {
            let inv = self.invocation(a, Phase::RuleAction);
            self.builder.accept(inv);
        }
    }

    /// `from --fn name--> invocation(f, phase)`
    fn chain(&mut self, from: usize, f: usize, phase: Phase) {
        let inv = self.invocation(f, phase);
        self.builder.add_transition(from, &self.tp.functions[f].name, inv);
    }

    /// State reached right after the function name (and after each
    /// complete argument) of function `f` in `phase`.
    fn invocation(&mut self, f: usize, phase: Phase) -> usize {
        if let Some(&state) = self.invocations.get(&(f, phase)) {
            return state;
        }
        let inv = self.builder.add_state();
        self.invocations.insert((f, phase), inv);

        let function = &self.tp.functions[f];
        let is_action = function.kind == FunctionKind::Action;

        for (name, ty) in &function.params {
            let operators = ty.operators(is_action);
            let mut values = ty.literal_values();
            if phase.allows_var_refs() {
                values.extend(self.var_refs.iter().cloned());
            }
            let measure_unit = match ty {
                ParamType::Measure(unit) => Some(unit.as_str()),
                _                        => None,
            };
            if operators.is_empty() || (values.is_empty() && measure_unit.is_none()) {
                continue;
            }

            let op_state = self.builder.add_state();
            let value_state = self.builder.add_state();
            if !self.builder.add_transition(inv, name, op_state) {
                tracing::debug!("{}: duplicate parameter '{}' ignored", function.name, name);
                continue;
            }
            for op in operators {
                self.builder.add_transition(op_state, op, value_state);
            }
            for value in &values {
                self.builder.add_transition(value_state, value, inv);
            }

            if let Some(unit) = measure_unit {
                let unit_state = self.builder.add_state();
                for value in slots("NUMBER") {
                    self.builder.add_transition(value_state, &value, unit_state);
                }
                for u in unit_family(unit) {
                    self.builder.add_transition(unit_state, u, inv);
                }
            }
        }
        inv
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grammar::END_ID;

    const RULES: &str = "\
trigger tt:twitter.source from Username text String hashtags Array(Hashtag)
query tt:weather.current location Location temperature Measure(C) status Enum(sunny,cloudy,raining)
action tt:twitter.post status String
action tt:thermostat.set_target_temperature value Measure(C)
device tt:device.twitter
entity tt:stock_id
";

    fn grammar() -> ThingtalkGrammar {
        ThingtalkGrammar::new(&Thingpedia::parse(RULES).unwrap())
    }

    fn ids(g: &ThingtalkGrammar, program: &str) -> Vec<usize> {
        program
            .split_whitespace()
            .map(|t| g.vocabulary().id(t).unwrap_or_else(|| panic!("unknown token {t}")))
            .collect()
    }

    #[test]
    fn test_parse_thingpedia_lines() {
        let tp = Thingpedia::parse(RULES).unwrap();
        assert_eq!(tp.functions.len(), 4);
        assert_eq!(tp.devices, vec!["tt:device.twitter"]);
        assert_eq!(tp.entities, vec!["tt:stock_id"]);

        let weather = &tp.functions[1];
        assert_eq!(weather.kind, FunctionKind::Query);
        assert_eq!(weather.params[1].1, ParamType::Measure("C".into()));
        assert_eq!(
            weather.params[2].1,
            ParamType::Enum(vec!["sunny".into(), "cloudy".into(), "raining".into()])
        );
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let err = Thingpedia::parse("trigger tt:a.b from").unwrap_err();
        assert!(matches!(err, SetupError::MalformedRule { line: 1, .. }));

        let err = Thingpedia::parse("\nmonitor tt:a.b").unwrap_err();
        assert!(matches!(err, SetupError::MalformedRule { line: 2, .. }));
    }

    #[test]
    fn test_param_type_parse() {
        assert_eq!(ParamType::parse("Bool"), ParamType::Boolean);
        assert_eq!(ParamType::parse("Entity(tt:stock_id)"), ParamType::Entity("tt:stock_id".into()));
        assert_eq!(
            ParamType::parse("Array(String)"),
            ParamType::Array(Box::new(ParamType::String))
        );
        assert_eq!(ParamType::parse("Picture"), ParamType::Other("Picture".into()));
    }

    #[test]
    fn test_accepts_well_formed_programs() {
        let g = grammar();
        for program in [
            "special tt:root.special.yes",
            "answer NUMBER_0 C",
            "answer QUOTED_STRING_1",
            "command help tt:device.twitter",
            "command list query",
            "trigger tt:twitter.source",
            "trigger tt:twitter.source text contains QUOTED_STRING_0",
            "query tt:weather.current temperature > NUMBER_0 F status is sunny",
            "action tt:twitter.post status is QUOTED_STRING_0",
            "rule tt:twitter.source from is USERNAME_0 tt:twitter.post status is text",
            "rule tt:twitter.source tt:weather.current tt:thermostat.set_target_temperature value is NUMBER_2 C",
            "rule tt:weather.current location is location:home tt:twitter.post",
        ] {
            assert!(g.accepts(&ids(&g, program)), "should accept: {program}");
        }
    }

    #[test]
    fn test_rejects_ill_formed_programs() {
        let g = grammar();
        for program in [
            // actions only take `is`
            "action tt:twitter.post status contains QUOTED_STRING_0",
            // measure needs a unit from its family
            "query tt:weather.current temperature is NUMBER_0 kg",
            // a rule must end in an action
            "rule tt:twitter.source",
            // no parameter passing outside a rule
            "action tt:twitter.post status is text",
            // arrays use `has`
            "trigger tt:twitter.source hashtags is HASHTAG_0",
        ] {
            let tokens: Option<Vec<usize>> = program
                .split_whitespace()
                .map(|t| g.vocabulary().id(t))
                .collect();
            if let Some(tokens) = tokens {
                assert!(!g.accepts(&tokens), "should reject: {program}");
            }
        }
    }

    #[test]
    fn test_action_array_argument_takes_is() {
        let tp = Thingpedia::parse("action tt:twitter.post_tags tags Array(Hashtag)\n").unwrap();
        let g = ThingtalkGrammar::new(&tp);
        assert!(g.accepts(&ids(&g, "action tt:twitter.post_tags tags is HASHTAG_0")));
        // `has` is a filter operator; actions never offer it
        assert!(g.vocabulary().id("has").is_none());
    }

    #[test]
    fn test_first_step_never_allows_end() {
        let g = grammar();
        let first = g.valid_next(&[]);
        assert!(!first.contains(&END_ID));
        assert_eq!(first.len(), 7);
    }
}
