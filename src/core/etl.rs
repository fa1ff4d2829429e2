use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitoring_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitoring_enabled),
        }
    }

    pub fn run(&self) -> Result<String> {
        println!("Starting ETL process...");
        self.monitor.log_stats("Startup");

        // Extract
        println!("Extracting data...");
        let raw_data = self.pipeline.extract()?;
        self.monitor.log_stats("Extract");

        // Transform
        println!("Transforming data...");
        let transformed_result = self.pipeline.transform(raw_data)?;
        println!("Transformed {} records", transformed_result.processed_records);
        self.monitor.log_stats("Transform");

        if !transformed_result.report.is_empty() {
            println!();
            println!("{}", transformed_result.report);
        }

        // Load
        println!("Loading data...");
        let output_path = self.pipeline.load(transformed_result)?;
        println!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
