use clap::Args;
use olympiad::error::AppError;
use olympiad::identity::{format_cpf, Cpf, CpfStyle};
use olympiad::registry::{School, SchoolImporter};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct CpfArgs {
    /// CPF with or without punctuation
    pub(crate) value: String,
}

#[derive(Args, Debug)]
pub(crate) struct SchoolsArgs {
    /// Registry CSV export (inep,name,city,zone,tier,code,phone,latitude,longitude)
    pub(crate) path: PathBuf,
    /// Only list schools in this city
    #[arg(long)]
    pub(crate) city: Option<String>,
}

pub(crate) fn run_cpf(args: CpfArgs) -> Result<(), AppError> {
    println!("{}", describe_cpf(&args.value));
    Ok(())
}

pub(crate) fn run_schools(args: SchoolsArgs) -> Result<(), AppError> {
    let schools = SchoolImporter::from_path(&args.path)?;
    let listing = school_listing(schools, args.city.as_deref());
    println!("{} school(s) in {}", listing.len(), args.path.display());
    for line in listing {
        println!("{line}");
    }
    Ok(())
}

fn describe_cpf(raw: &str) -> String {
    match Cpf::parse(raw) {
        Ok(cpf) => format!("valid: {} ({})", cpf.display(), cpf.as_str()),
        Err(err) => match format_cpf(raw, CpfStyle::Punctuated) {
            Ok(shaped) => format!("invalid: {shaped} ({err})"),
            Err(_) => format!("invalid: {err}"),
        },
    }
}

fn school_listing(mut schools: Vec<School>, city: Option<&str>) -> Vec<String> {
    if let Some(city) = city {
        schools.retain(|school| school.city.eq_ignore_ascii_case(city.trim()));
    }
    schools.sort_by(|a, b| a.city.cmp(&b.city).then_with(|| a.name.cmp(&b.name)));
    schools
        .into_iter()
        .map(|school| {
            format!(
                "{}  {:<40}  {} ({})",
                school.id, school.name, school.city, school.tier
            )
        })
        .collect()
}
