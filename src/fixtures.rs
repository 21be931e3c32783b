#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::{Deserialize, Serialize, Serializer};

    use crate::schema::{ArgEnum, ArgSchema, Field};
    use crate::types::{FieldType, Scalar};

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Optimizer {
        Adam,
        Sgd,
    }

    impl ArgEnum for Optimizer {
        fn variants() -> &'static [Self] {
            &[Optimizer::Adam, Optimizer::Sgd]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TrainArgs {
        pub lr: f64,
        pub epochs: i64,
        pub optimizer: Optimizer,
        pub tags: Vec<String>,
        pub seed: Option<i64>,
    }

    impl ArgSchema for TrainArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<f64>("lr").default(1e-3).help("Learning rate."),
                Field::of::<i64>("epochs").default(10),
                Field::enumeration::<Optimizer>("optimizer").default(Optimizer::Adam),
                Field::of::<Vec<String>>("tags").default_factory(Vec::<String>::new),
                Field::of::<Option<i64>>("seed").default(None::<i64>),
            ]
        }

        fn group() -> Option<&'static str> {
            Some("Training")
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct EnvArgs {
        pub name: String,
        pub static_env: bool,
        pub render: bool,
    }

    impl ArgSchema for EnvArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<String>("name").default("cartpole"),
                Field::of::<bool>("static_env").default(true),
                Field::of::<bool>("render"),
            ]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct Layer {
        pub width: i64,
        pub activation: String,
    }

    impl ArgSchema for Layer {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<i64>("width"),
                Field::of::<String>("activation").default("relu"),
            ]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct ExperimentArgs {
        pub train: TrainArgs,
        pub env: EnvArgs,
        pub workers: i64,
        pub layers: Vec<Layer>,
        pub heads: BTreeMap<String, Layer>,
        pub _device: Option<String>,
    }

    impl ArgSchema for ExperimentArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::nested::<TrainArgs>("train"),
                Field::nested::<EnvArgs>("env"),
                Field::of::<i64>("workers").default(1),
                Field::seq_of::<Layer>("layers").default_factory(Vec::<Layer>::new),
                Field::map_of::<Layer>("heads").default_factory(BTreeMap::<String, Layer>::new),
                Field::of::<Option<String>>("_device").default(None::<String>),
            ]
        }
    }

    // -- Fixtures for required fields and the config field ----------------------

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct RequiredArgs {
        pub name: String,
        pub count: i64,
    }

    impl ArgSchema for RequiredArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<String>("name"),
                Field::of::<i64>("count").default(3),
            ]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct WithConfigField {
        pub config: Option<String>,
        pub lr: f64,
    }

    impl ArgSchema for WithConfigField {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<Option<String>>("config").default(None::<String>),
                Field::of::<f64>("lr").default(0.1),
            ]
        }
    }

    // -- Fixtures rejected at registration ---------------------------------------

    #[derive(Serialize, Deserialize, Debug)]
    pub struct UnionArgs {
        pub seed: serde_json::Value,
    }

    impl ArgSchema for UnionArgs {
        fn fields() -> Vec<Field> {
            vec![Field::new(
                "seed",
                FieldType::Union(vec![
                    FieldType::Scalar(Scalar::Int),
                    FieldType::Scalar(Scalar::Str),
                ]),
            )]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct CyclicArgs {
        pub inner: Option<Box<CyclicArgs>>,
    }

    impl ArgSchema for CyclicArgs {
        fn fields() -> Vec<Field> {
            vec![Field::nested::<CyclicArgs>("inner")]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct DuplicateArgs {
        pub a: i64,
    }

    impl ArgSchema for DuplicateArgs {
        fn fields() -> Vec<Field> {
            vec![Field::of::<i64>("a"), Field::of::<i64>("a").default(2)]
        }
    }

    // -- Enums serialized as numbers --------------------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(into = "u8", try_from = "u8")]
    pub enum Level {
        Low = 1,
        Mid = 2,
        High = 3,
    }

    impl From<Level> for u8 {
        fn from(level: Level) -> u8 {
            level as u8
        }
    }

    impl TryFrom<u8> for Level {
        type Error = String;

        fn try_from(value: u8) -> Result<Self, Self::Error> {
            match value {
                1 => Ok(Level::Low),
                2 => Ok(Level::Mid),
                3 => Ok(Level::High),
                other => Err(format!("no level {other}")),
            }
        }
    }

    impl ArgEnum for Level {
        fn variants() -> &'static [Self] {
            &[Level::Low, Level::Mid, Level::High]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(into = "f64", try_from = "f64")]
    pub enum Ratio {
        Half,
        Full,
    }

    impl From<Ratio> for f64 {
        fn from(ratio: Ratio) -> f64 {
            match ratio {
                Ratio::Half => 0.5,
                Ratio::Full => 1.0,
            }
        }
    }

    impl TryFrom<f64> for Ratio {
        type Error = String;

        fn try_from(value: f64) -> Result<Self, Self::Error> {
            if value == 0.5 {
                Ok(Ratio::Half)
            } else if value == 1.0 {
                Ok(Ratio::Full)
            } else {
                Err(format!("no ratio {value}"))
            }
        }
    }

    impl ArgEnum for Ratio {
        fn variants() -> &'static [Self] {
            &[Ratio::Half, Ratio::Full]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct LevelArgs {
        pub level: Level,
        pub ratio: Ratio,
    }

    impl ArgSchema for LevelArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::enumeration::<Level>("level").default(Level::Mid),
                Field::enumeration::<Ratio>("ratio").default(Ratio::Full),
            ]
        }
    }

    // -- Fixtures whose flags collide ----------------------------------------------

    #[derive(Serialize, Deserialize, Debug)]
    pub struct HelpArgs {
        pub help: i64,
    }

    impl ArgSchema for HelpArgs {
        fn fields() -> Vec<Field> {
            vec![Field::of::<i64>("help").default(0)]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct NegationClashArgs {
        pub x: bool,
        pub no_x: bool,
    }

    impl ArgSchema for NegationClashArgs {
        fn fields() -> Vec<Field> {
            vec![Field::of::<bool>("x").default(true), Field::of::<bool>("no_x")]
        }
    }

    // -- Fixtures with values that have no JSON form ------------------------------

    /// Maps with non-string keys fail to serialize to JSON.
    pub fn tuple_keyed() -> BTreeMap<(i64, i64), i64> {
        BTreeMap::from([((1, 2), 3)])
    }

    #[derive(Debug, Clone, Copy)]
    pub enum Unserializable {
        Only,
    }

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no serialized form"))
        }
    }

    impl ArgEnum for Unserializable {
        fn variants() -> &'static [Self] {
            &[Unserializable::Only]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct BadDefaultArgs {
        pub grid: i64,
    }

    impl ArgSchema for BadDefaultArgs {
        fn fields() -> Vec<Field> {
            vec![Field::of::<i64>("grid").default(tuple_keyed())]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct BadFactoryArgs {
        pub grid: i64,
    }

    impl ArgSchema for BadFactoryArgs {
        fn fields() -> Vec<Field> {
            vec![Field::of::<i64>("grid").default_factory(tuple_keyed)]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct BadEnumArgs {
        pub mode: String,
    }

    impl ArgSchema for BadEnumArgs {
        fn fields() -> Vec<Field> {
            vec![Field::enumeration::<Unserializable>("mode")]
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct BadNestedArgs {
        pub workers: i64,
        pub inner: BadDefaultArgs,
    }

    impl ArgSchema for BadNestedArgs {
        fn fields() -> Vec<Field> {
            vec![
                Field::of::<i64>("workers").default(1),
                Field::nested::<BadDefaultArgs>("inner"),
            ]
        }
    }

    // -- A schema nested several times, counting its field declarations -------------

    /// Number of times `CountedLeaf::fields` ran.
    pub static LEAF_DECLARATIONS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct CountedLeaf {
        pub size: i64,
    }

    impl ArgSchema for CountedLeaf {
        fn fields() -> Vec<Field> {
            LEAF_DECLARATIONS.fetch_add(1, Ordering::SeqCst);
            vec![Field::of::<i64>("size").default(1)]
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct CountedRoot {
        pub first: CountedLeaf,
        pub second: CountedLeaf,
        pub many: Vec<CountedLeaf>,
        pub named: BTreeMap<String, CountedLeaf>,
    }

    impl ArgSchema for CountedRoot {
        fn fields() -> Vec<Field> {
            vec![
                Field::nested::<CountedLeaf>("first"),
                Field::nested::<CountedLeaf>("second"),
                Field::seq_of::<CountedLeaf>("many").default_factory(Vec::<CountedLeaf>::new),
                Field::map_of::<CountedLeaf>("named")
                    .default_factory(BTreeMap::<String, CountedLeaf>::new),
            ]
        }
    }

    #[test]
    fn experiment_builds_from_defaults() {
        let args: ExperimentArgs = crate::registry::construct(Default::default(), true).unwrap();
        assert_eq!(args.train.epochs, 10);
        assert_eq!(args.env.name, "cartpole");
        assert_eq!(args.workers, 1);
    }
}
